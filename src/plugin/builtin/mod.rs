//! Built-in Plugin Implementations
//!
//! Plugins that ship with the host. They self-register through `builtin!`.

pub mod api;
pub mod essentials;
pub mod greeter;
