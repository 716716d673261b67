//! Plugin Context
//!
//! Runtime environment handed to a plugin during initialization: its
//! settings, the host API version and bus access scoped to the plugin, so
//! every subscription it makes is owned by it and revoked when it unloads.

use crate::notifications::api::{
    Event, EventBus, EventBusResult, HandlerResult, SubscriptionHandle,
};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::settings::PluginSettings;
use std::sync::Arc;

pub struct PluginContext {
    plugin_name: String,
    bus: Arc<EventBus>,
    settings: PluginSettings,
    api_version: u32,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_name", &self.plugin_name)
            .field("settings", &self.settings.len())
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl PluginContext {
    pub fn new(
        plugin_name: &str,
        bus: Arc<EventBus>,
        settings: PluginSettings,
        api_version: u32,
    ) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            bus,
            settings,
            api_version,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Shared bus handle, for handlers that need to emit
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Subscribe on behalf of this plugin
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> PluginResult<SubscriptionHandle>
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.bus
            .subscribe(pattern, &self.plugin_name, handler)
            .map_err(|cause| PluginError::Subscription {
                plugin_name: self.plugin_name.clone(),
                cause,
            })
    }

    /// Publish `"<plugin>.<name>"`
    pub fn emit(&self, name: &str, payload: serde_json::Value) -> EventBusResult<()> {
        self.bus.emit(
            Event::with_payload(format!("{}.{}", self.plugin_name, name), payload)
                .from_source(self.plugin_name.as_str()),
        )
    }
}
