//! Public API for the plugin system
//!
//! External modules should import from here rather than directly from internal modules.

// Core plugin management
pub use crate::plugin::manager::{PluginManager, PluginManagerConfig};

// Error handling
pub use crate::plugin::error::{PluginError, PluginResult};

// Plugin metadata, state and load reports
pub use crate::plugin::types::{
    BlockedPlugin, LoadFailure, LoadReport, PluginDependency, PluginInfo, PluginState, PluginStatus,
};

// Plugin traits
pub use crate::plugin::traits::{Plugin, PluginFactory};

// Plugin context and settings
pub use crate::plugin::context::PluginContext;
pub use crate::plugin::settings::PluginSettings;

// Plugin registry
pub use crate::plugin::registry::{PluginEntry, PluginRegistry};

// Builtin plugins
pub use crate::plugin::builtin::api::builtin_factories;
pub use crate::plugin::builtin::essentials::CorePlugin;
pub use crate::plugin::builtin::greeter::GreeterPlugin;
