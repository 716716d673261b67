//! Test modules for the plugin system
//!
//! Manager-level suites share the mock plugins in `utils`.

mod reload;
mod utils;
