//! Plugin Trait System
//!
//! A plugin is a unit of deployable functionality: it declares its identity
//! and dependencies, contributes commands and may subscribe to events. The
//! manager is the only caller of these hooks.
//!
//! Plugins are registered through factories so that loading and reloading
//! always start from a fresh instance; everything else refers to a plugin by
//! name and goes through the registry.

use crate::command::api::Command;
use crate::plugin::context::PluginContext;
use crate::plugin::error::PluginResult;
use crate::plugin::types::PluginInfo;
use std::sync::Arc;

/// Base plugin trait that all plugins must implement
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Get plugin metadata
    fn plugin_info(&self) -> PluginInfo;

    /// Commands contributed while the plugin is active
    ///
    /// Called after a successful `initialize`; registration fails as a whole
    /// if any name collides with a command of another active plugin.
    fn commands(&self) -> Vec<Arc<dyn Command>>;

    /// Runs once every dependency is active
    async fn initialize(&mut self, context: &PluginContext) -> PluginResult<()>;

    /// Release plugin resources. Subscriptions and commands are revoked by the manager.
    async fn cleanup(&mut self) -> PluginResult<()>;
}

/// Creates fresh plugin instances
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;
