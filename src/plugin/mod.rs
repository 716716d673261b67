//! Plugin System Module
//!
//! Plugins are registered through factories, loaded in dependency order and
//! torn down in reverse. While active a plugin contributes commands to the
//! shared command table and may subscribe to events on the bus.

// Internal modules - all access should go through api module
pub(crate) mod builtin;
pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod manager;
pub(crate) mod registry;
pub(crate) mod settings;
pub(crate) mod traits;
pub(crate) mod types;

// Public API module - the only public interface for the plugin system
pub mod api;

#[cfg(test)]
mod tests;
