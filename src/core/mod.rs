//! Core services shared by every subsystem

pub mod cancellation;
pub mod error_handling;
pub mod logging;
pub mod shutdown;
pub mod styles;
pub mod version;
