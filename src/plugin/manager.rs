//! Plugin Manager
//!
//! Central coordinator for the plugin lifecycle. Owns the registry, drives
//! plugins through `Unloaded → Loaded → Initialized → Active` in dependency
//! order, tears them down again, hot-reloads them and keeps the shared
//! command table in step with the set of active plugins.
//!
//! Lifecycle operations are serialized behind one async mutex. Transitions are
//! announced on the event bus (`plugin.*`).

use crate::command::api::{CommandDescriptor, SharedCommandTable};
use crate::core::error_handling::{log_error_with_context, ContextualError};
use crate::notifications::api::{names, Event, EventBus};
use crate::plugin::context::PluginContext;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::registry::PluginRegistry;
use crate::plugin::settings::PluginSettings;
use crate::plugin::traits::{Plugin, PluginFactory};
use crate::plugin::types::{
    BlockedPlugin, LoadFailure, LoadReport, PluginInfo, PluginState, PluginStatus,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Host-side plugin configuration
#[derive(Debug, Clone, Default)]
pub struct PluginManagerConfig {
    /// Plugins `load_all` leaves unloaded
    pub disabled: BTreeSet<String>,
    /// Per-plugin settings, keyed by plugin name
    pub settings: BTreeMap<String, PluginSettings>,
}

pub struct PluginManager {
    registry: Mutex<PluginRegistry>,
    commands: SharedCommandTable,
    bus: Arc<EventBus>,
    config: PluginManagerConfig,
    api_version: u32,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("config", &self.config)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl PluginManager {
    pub fn new(bus: Arc<EventBus>, commands: SharedCommandTable, config: PluginManagerConfig) -> Self {
        Self {
            registry: Mutex::new(PluginRegistry::new()),
            commands,
            bus,
            config,
            api_version: crate::core::version::get_api_version(),
        }
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn commands(&self) -> &SharedCommandTable {
        &self.commands
    }

    /// Same major version (year) is compatible
    pub fn is_api_compatible(&self, plugin_api_version: u32) -> bool {
        crate::core::version::api_major(self.api_version)
            == crate::core::version::api_major(plugin_api_version)
    }

    /// Register a plugin factory
    ///
    /// Dependencies are only checked when the load order is resolved, so
    /// plugins may be registered in any order.
    pub async fn register(&self, factory: PluginFactory) -> PluginResult<PluginInfo> {
        let info = factory().plugin_info();
        if !self.is_api_compatible(info.api_version) {
            return Err(PluginError::IncompatibleApi {
                plugin_name: info.name,
                plugin_api: info.api_version,
                host_api: self.api_version,
            });
        }

        self.registry
            .lock()
            .await
            .register(info.clone(), factory)?;
        log::debug!("PluginManager: registered '{}' {}", info.name, info.version);

        self.emit(
            names::PLUGIN_REGISTERED,
            json!({
                "plugin": info.name,
                "version": info.version.to_string(),
                "dependencies": info.dependencies.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            }),
        );
        Ok(info)
    }

    /// Register every builtin plugin linked into the binary
    pub async fn register_builtins(&self) -> PluginResult<usize> {
        let mut registered = 0;
        for factory in crate::plugin::builtin::api::builtin_factories() {
            self.register(factory).await?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Load every registered plugin in dependency order
    ///
    /// Fails only when the dependency graph is invalid, in which case nothing
    /// is loaded. Initialization failures mark that plugin `Failed` and its
    /// dependents `BlockedByDependency`; the batch always runs to the end.
    pub async fn load_all(&self) -> PluginResult<LoadReport> {
        let mut registry = self.registry.lock().await;
        let order = registry.resolve_load_order().inspect_err(|e| {
            log_error_with_context(e, "Plugin dependency resolution");
        })?;
        let mut report = LoadReport::new(order.clone());

        for name in &order {
            let Some(state) = registry.state(name) else {
                continue;
            };
            if state.is_active() {
                continue;
            }
            if self.config.disabled.contains(name) {
                log::info!("PluginManager: '{}' is disabled", name);
                report.skipped.push(name.clone());
                continue;
            }
            if let Some(dependency) = Self::first_inactive_dependency(&registry, name) {
                self.block(&mut registry, name, &dependency);
                report.blocked.push(BlockedPlugin {
                    plugin: name.clone(),
                    dependency,
                });
                continue;
            }
            match self.activate(&mut registry, name).await {
                Ok(()) => report.loaded.push(name.clone()),
                Err(error) => report.failed.push(LoadFailure::new(name, &error)),
            }
        }

        log::info!(
            "PluginManager: {} loaded, {} failed, {} blocked, {} skipped",
            report.loaded.len(),
            report.failed.len(),
            report.blocked.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Load one plugin, loading its inactive dependencies first
    pub async fn load(&self, name: &str) -> PluginResult<()> {
        let mut registry = self.registry.lock().await;
        let state = registry.entry(name)?.state;
        if state.is_active() {
            return Ok(());
        }

        for plugin in registry.load_order_for(name)? {
            if registry.state(&plugin).is_some_and(PluginState::is_active) {
                continue;
            }
            if let Err(error) = self.activate(&mut registry, &plugin).await {
                if plugin == name {
                    return Err(error);
                }
                let state = registry.state(&plugin).unwrap_or(PluginState::Failed);
                self.block(&mut registry, name, &plugin);
                return Err(PluginError::DependencyUnavailable {
                    plugin_name: name.to_string(),
                    dependency: plugin,
                    state,
                });
            }
        }
        Ok(())
    }

    /// Unload an active plugin whose dependents are all inactive
    pub async fn unload(&self, name: &str) -> PluginResult<()> {
        let mut registry = self.registry.lock().await;
        self.ensure_unloadable(&registry, name, "unload")?;
        self.deactivate(&mut registry, name).await;
        Ok(())
    }

    /// Replace the plugin with a fresh instance
    ///
    /// If the new instance cannot be activated, the previous instance is
    /// re-initialized. If that fails too the plugin is left `Unloaded`. Old
    /// and new instances are never active at the same time.
    pub async fn reload(&self, name: &str) -> PluginResult<()> {
        let mut registry = self.registry.lock().await;
        let state = registry.entry(name)?.state;
        if !state.is_active() {
            log::debug!("PluginManager: '{}' is {}, reload is a plain load", name, state);
            drop(registry);
            return self.load(name).await;
        }
        self.ensure_unloadable(&registry, name, "reload")?;

        let fresh = (registry.entry(name)?.factory)();
        let fresh_info = fresh.plugin_info();
        if let Err(cause) = self.check_replacement(&registry, name, &fresh_info) {
            return Err(PluginError::ReloadFailed {
                plugin_name: name.to_string(),
                restored: true,
                cause: cause.to_string(),
            });
        }

        let previous = self.deactivate(&mut registry, name).await;
        let previous_info = registry.entry(name)?.info.clone();
        registry.entry_mut(name)?.info = fresh_info.clone();

        match self.activate_instance(&mut registry, name, fresh).await {
            Ok(()) => {
                log::info!(
                    "PluginManager: reloaded '{}' ({} -> {})",
                    name,
                    previous_info.version,
                    fresh_info.version
                );
                self.emit(
                    names::PLUGIN_RELOADED,
                    json!({
                        "plugin": name,
                        "previous_version": previous_info.version.to_string(),
                        "version": fresh_info.version.to_string(),
                    }),
                );
                Ok(())
            }
            Err(cause) => {
                registry.entry_mut(name)?.info = previous_info;
                let restored = match previous {
                    Some(instance) => self.activate_instance(&mut registry, name, instance).await.is_ok(),
                    None => false,
                };
                if !restored {
                    let entry = registry.entry_mut(name)?;
                    entry.state = PluginState::Unloaded;
                }
                let error = PluginError::ReloadFailed {
                    plugin_name: name.to_string(),
                    restored,
                    cause: cause.to_string(),
                };
                log_error_with_context(&error, "Plugin reload");
                Err(error)
            }
        }
    }

    /// Unload every active plugin, dependents first
    pub async fn shutdown(&self) -> usize {
        let mut registry = self.registry.lock().await;
        let order: Vec<String> = registry.activation_order().iter().rev().cloned().collect();
        for name in &order {
            self.deactivate(&mut registry, name).await;
        }
        if !order.is_empty() {
            log::info!("PluginManager: shut down {} plugin(s)", order.len());
        }
        order.len()
    }

    /// Merged command map of all active plugins
    ///
    /// Cross-checks the command table against the registry; a command owned
    /// by an inactive plugin means the registry is corrupted.
    pub async fn get_commands(&self) -> PluginResult<BTreeMap<String, CommandDescriptor>> {
        let registry = self.registry.lock().await;
        let table = self.commands.read().await;

        let mut merged = BTreeMap::new();
        for descriptor in table.descriptors() {
            let claimed = registry
                .get(&descriptor.plugin)
                .is_some_and(|e| e.state.is_active() && e.commands.contains(&descriptor.name));
            if !claimed {
                let error = PluginError::RegistryCorrupted {
                    detail: format!(
                        "command '{}' is held by '{}', which does not own it as an active plugin",
                        descriptor.name, descriptor.plugin
                    ),
                };
                log_error_with_context(&error, "Command map merge");
                return Err(error);
            }
            merged.insert(descriptor.name.clone(), descriptor.clone());
        }
        Ok(merged)
    }

    pub async fn state(&self, name: &str) -> Option<PluginState> {
        self.registry.lock().await.state(name)
    }

    /// One status per plugin, in registration order
    pub async fn statuses(&self) -> Vec<PluginStatus> {
        self.registry
            .lock()
            .await
            .entries()
            .map(|e| e.status())
            .collect()
    }

    pub async fn load_order(&self) -> PluginResult<Vec<String>> {
        self.registry.lock().await.resolve_load_order()
    }

    pub async fn active_plugins(&self) -> Vec<String> {
        self.registry.lock().await.activation_order().to_vec()
    }

    fn ensure_unloadable(&self, registry: &PluginRegistry, name: &str, operation: &str) -> PluginResult<()> {
        let state = registry.entry(name)?.state;
        if !state.is_active() {
            return Err(PluginError::InvalidState {
                plugin_name: name.to_string(),
                state,
                operation: operation.to_string(),
            });
        }
        let dependents = registry.active_dependents_of(name);
        if !dependents.is_empty() {
            return Err(PluginError::DependentsStillActive {
                plugin_name: name.to_string(),
                dependents,
            });
        }
        Ok(())
    }

    /// A reload must keep the name and still be satisfiable by active plugins
    fn check_replacement(&self, registry: &PluginRegistry, name: &str, info: &PluginInfo) -> PluginResult<()> {
        if info.name != name {
            return Err(PluginError::InvalidState {
                plugin_name: name.to_string(),
                state: PluginState::Active,
                operation: format!("replace with '{}' during reload of", info.name),
            });
        }
        if !self.is_api_compatible(info.api_version) {
            return Err(PluginError::IncompatibleApi {
                plugin_name: name.to_string(),
                plugin_api: info.api_version,
                host_api: self.api_version,
            });
        }
        for dependency in &info.dependencies {
            let Some(target) = registry.get(&dependency.name) else {
                return Err(PluginError::InvalidDependency {
                    plugin_name: name.to_string(),
                    dependency: dependency.name.clone(),
                    reason: "no such plugin is registered".to_string(),
                });
            };
            if !dependency.accepts(&target.info.version) {
                return Err(PluginError::InvalidDependency {
                    plugin_name: name.to_string(),
                    dependency: dependency.name.clone(),
                    reason: format!("requires {}, found {}", dependency.requirement, target.info.version),
                });
            }
            if !target.state.is_active() {
                return Err(PluginError::DependencyUnavailable {
                    plugin_name: name.to_string(),
                    dependency: dependency.name.clone(),
                    state: target.state,
                });
            }
        }
        Ok(())
    }

    fn first_inactive_dependency(registry: &PluginRegistry, name: &str) -> Option<String> {
        let entry = registry.get(name)?;
        entry
            .info
            .dependencies
            .iter()
            .find(|d| !registry.state(&d.name).is_some_and(PluginState::is_active))
            .map(|d| d.name.clone())
    }

    fn block(&self, registry: &mut PluginRegistry, name: &str, dependency: &str) {
        if let Some(entry) = registry.get_mut(name) {
            entry.state = PluginState::BlockedByDependency;
            entry.blocked_by = Some(dependency.to_string());
        }
        log::warn!("PluginManager: '{}' blocked by dependency '{}'", name, dependency);
        self.emit(
            names::PLUGIN_BLOCKED,
            json!({ "plugin": name, "dependency": dependency }),
        );
    }

    /// Create a fresh instance and bring it to `Active`
    async fn activate(&self, registry: &mut PluginRegistry, name: &str) -> PluginResult<()> {
        let instance = (registry.entry(name)?.factory)();
        self.activate_instance(registry, name, instance).await
    }

    async fn activate_instance(
        &self,
        registry: &mut PluginRegistry,
        name: &str,
        mut instance: Box<dyn Plugin>,
    ) -> PluginResult<()> {
        {
            let entry = registry.entry_mut(name)?;
            entry.state = PluginState::Loaded;
            entry.failure = None;
            entry.blocked_by = None;
        }
        log::debug!("PluginManager: '{}' loaded", name);

        let settings = self.config.settings.get(name).cloned().unwrap_or_default();
        let context = PluginContext::new(name, Arc::clone(&self.bus), settings, self.api_version);

        if let Err(cause) = instance.initialize(&context).await {
            let error = PluginError::InitFailed {
                plugin_name: name.to_string(),
                cause: cause.to_string(),
            };
            self.fail(registry, name, &error);
            return Err(error);
        }
        registry.entry_mut(name)?.state = PluginState::Initialized;
        log::debug!("PluginManager: '{}' initialized", name);

        let registered = self
            .commands
            .write()
            .await
            .register_all(name, instance.commands());
        let commands = match registered {
            Ok(commands) => commands,
            Err(cause) => {
                if let Err(cleanup) = instance.cleanup().await {
                    log::warn!("PluginManager: cleanup of '{}' failed: {}", name, cleanup);
                }
                let error = PluginError::CommandConflict {
                    plugin_name: name.to_string(),
                    cause,
                };
                self.fail(registry, name, &error);
                return Err(error);
            }
        };

        let version = {
            let entry = registry.entry_mut(name)?;
            entry.state = PluginState::Active;
            entry.commands = commands.clone();
            entry.instance = Some(instance);
            entry.info.version.to_string()
        };
        registry.mark_activated(name);

        log::info!("PluginManager: '{}' {} active", name, version);
        self.emit(
            names::PLUGIN_LOADED,
            json!({ "plugin": name, "version": version, "commands": commands }),
        );
        Ok(())
    }

    /// Record a failed activation and undo its side effects
    fn fail(&self, registry: &mut PluginRegistry, name: &str, error: &PluginError) {
        self.bus.unsubscribe_all(name);
        if let Some(entry) = registry.get_mut(name) {
            entry.state = PluginState::Failed;
            entry.failure = Some(error.to_string());
            entry.instance = None;
            entry.commands.clear();
        }
        log_error_with_context(error, "Plugin activation");
        self.emit(
            names::PLUGIN_FAILED,
            json!({ "plugin": name, "kind": error.kind(), "error": error.to_string() }),
        );
    }

    /// Tear down an active plugin and hand back its instance
    async fn deactivate(&self, registry: &mut PluginRegistry, name: &str) -> Option<Box<dyn Plugin>> {
        let mut instance = {
            let entry = registry.get_mut(name)?;
            entry.state = PluginState::Stopping;
            entry.instance.take()
        };

        let revoked = self.bus.unsubscribe_all(name);
        let removed = self.commands.write().await.remove_owner(name);

        let mut cleanup_error = None;
        if let Some(plugin) = instance.as_mut() {
            if let Err(error) = plugin.cleanup().await {
                log::warn!("PluginManager: cleanup of '{}' failed: {}", name, error);
                cleanup_error = Some(error.to_string());
            }
        }

        // Cleanup may still reach the bus through a context it kept
        let late = self.bus.unsubscribe_all(name);
        if late > 0 {
            log::warn!(
                "PluginManager: '{}' subscribed {} handler(s) during cleanup; revoked",
                name,
                late
            );
        }
        let revoked = revoked + late;

        if let Some(entry) = registry.get_mut(name) {
            entry.state = PluginState::Unloaded;
            entry.commands.clear();
        }
        registry.mark_deactivated(name);

        log::info!("PluginManager: '{}' unloaded", name);
        self.emit(
            names::PLUGIN_UNLOADED,
            json!({
                "plugin": name,
                "subscriptions_revoked": revoked,
                "commands_removed": removed,
                "cleanup_error": cleanup_error,
            }),
        );
        instance
    }

    fn emit(&self, name: &str, payload: serde_json::Value) {
        if let Err(error) = self
            .bus
            .emit(Event::with_payload(name, payload).from_source("plugin-manager"))
        {
            log::warn!("PluginManager: could not emit '{}': {}", name, error);
        }
    }
}
