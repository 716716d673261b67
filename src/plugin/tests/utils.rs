//! Plugin Test Utilities
//!
//! A configurable mock plugin and helpers shared by the manager suites.

use crate::command::api::{Command, CommandContext, CommandFailure, SharedCommandTable};
use crate::notifications::api::{Event, EventBus};
use crate::plugin::context::PluginContext;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::manager::{PluginManager, PluginManagerConfig};
use crate::plugin::traits::{Plugin, PluginFactory};
use crate::plugin::types::{PluginDependency, PluginInfo};
use semver::{Version, VersionReq};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared by every instance a blueprint creates
#[derive(Debug, Default)]
pub struct Probe {
    pub instances: AtomicUsize,
    pub initialized: AtomicUsize,
    pub cleaned_up: AtomicUsize,
    pub handled: AtomicUsize,
}

impl Probe {
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn cleaned_up(&self) -> usize {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }
}

/// Blueprint for mock plugin instances
///
/// Failure switches and the patch version are read when an instance is
/// created, so flipping them only affects later instances. `fail_reinitialize`
/// is read at initialize time and only trips an instance's second start.
#[derive(Clone)]
pub struct MockBlueprint {
    name: String,
    dependencies: Vec<PluginDependency>,
    commands: Vec<String>,
    patterns: Vec<String>,
    api_version: Option<u32>,
    patch: Arc<AtomicU64>,
    fail_initialize: Arc<AtomicBool>,
    fail_cleanup: Arc<AtomicBool>,
    fail_reinitialize: Arc<AtomicBool>,
    subscribe_in_cleanup: Arc<AtomicBool>,
    pub probe: Arc<Probe>,
}

impl MockBlueprint {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            commands: Vec::new(),
            patterns: Vec::new(),
            api_version: None,
            patch: Arc::new(AtomicU64::new(0)),
            fail_initialize: Arc::new(AtomicBool::new(false)),
            fail_cleanup: Arc::new(AtomicBool::new(false)),
            fail_reinitialize: Arc::new(AtomicBool::new(false)),
            subscribe_in_cleanup: Arc::new(AtomicBool::new(false)),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.dependencies.push(PluginDependency::any(name));
        self
    }

    pub fn requires(mut self, name: &str, requirement: &str) -> Self {
        let requirement = VersionReq::parse(requirement).unwrap();
        self.dependencies.push(PluginDependency::new(name, requirement));
        self
    }

    pub fn with_commands(mut self, commands: &[&str]) -> Self {
        self.commands = commands.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn subscribes_to(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_string());
        self
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = Some(api_version);
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_initialize.store(failing, Ordering::SeqCst);
    }

    pub fn set_cleanup_failing(&self, failing: bool) {
        self.fail_cleanup.store(failing, Ordering::SeqCst);
    }

    pub fn set_reinitialize_failing(&self, failing: bool) {
        self.fail_reinitialize.store(failing, Ordering::SeqCst);
    }

    /// Cleanup subscribes to `custom.*` through the bus kept from initialize
    pub fn set_subscribing_in_cleanup(&self, subscribing: bool) {
        self.subscribe_in_cleanup.store(subscribing, Ordering::SeqCst);
    }

    pub fn set_patch(&self, patch: u64) {
        self.patch.store(patch, Ordering::SeqCst);
    }

    pub fn factory(&self) -> PluginFactory {
        let blueprint = self.clone();
        Arc::new(move || Box::new(MockPlugin::new(blueprint.clone())) as Box<dyn Plugin>)
    }
}

pub struct MockPlugin {
    blueprint: MockBlueprint,
    info: PluginInfo,
    generation: usize,
    fail_initialize: bool,
    starts: usize,
    bus: Option<Arc<EventBus>>,
}

impl MockPlugin {
    fn new(blueprint: MockBlueprint) -> Self {
        let generation = blueprint.probe.instances.fetch_add(1, Ordering::SeqCst) + 1;
        let mut info = PluginInfo::new(&blueprint.name, Version::new(1, 0, blueprint.patch.load(Ordering::SeqCst)))
            .with_description("Mock plugin for testing")
            .with_author("Test Author");
        if let Some(api_version) = blueprint.api_version {
            info = info.with_api_version(api_version);
        }
        for dependency in &blueprint.dependencies {
            info = info.depends_on(dependency.clone());
        }
        let fail_initialize = blueprint.fail_initialize.load(Ordering::SeqCst);
        Self {
            blueprint,
            info,
            generation,
            fail_initialize,
            starts: 0,
            bus: None,
        }
    }
}

#[async_trait::async_trait]
impl Plugin for MockPlugin {
    fn plugin_info(&self) -> PluginInfo {
        self.info.clone()
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        self.blueprint
            .commands
            .iter()
            .map(|name| {
                Arc::new(MockCommand {
                    name: name.clone(),
                    plugin: self.blueprint.name.clone(),
                    generation: self.generation,
                }) as Arc<dyn Command>
            })
            .collect()
    }

    async fn initialize(&mut self, context: &PluginContext) -> PluginResult<()> {
        self.starts += 1;
        let refuse = self.fail_initialize
            || (self.starts > 1 && self.blueprint.fail_reinitialize.load(Ordering::SeqCst));
        if refuse {
            return Err(PluginError::Settings {
                plugin_name: self.blueprint.name.clone(),
                reason: "mock initialization failure".to_string(),
            });
        }

        for pattern in &self.blueprint.patterns {
            let probe = Arc::clone(&self.blueprint.probe);
            context.subscribe(pattern, move |_event: &Event| {
                probe.handled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
        }
        self.bus = Some(context.bus());
        self.blueprint.probe.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&mut self) -> PluginResult<()> {
        self.blueprint.probe.cleaned_up.fetch_add(1, Ordering::SeqCst);
        if let Some(bus) = self.bus.as_ref() {
            if self.blueprint.subscribe_in_cleanup.load(Ordering::SeqCst) {
                bus.subscribe("custom.*", &self.blueprint.name, |_| Ok(()))
                    .map_err(|cause| PluginError::Subscription {
                        plugin_name: self.blueprint.name.clone(),
                        cause,
                    })?;
            }
        }
        if self.blueprint.fail_cleanup.load(Ordering::SeqCst) {
            return Err(PluginError::Settings {
                plugin_name: self.blueprint.name.clone(),
                reason: "mock cleanup failure".to_string(),
            });
        }
        Ok(())
    }
}

struct MockCommand {
    name: String,
    plugin: String,
    generation: usize,
}

#[async_trait::async_trait]
impl Command for MockCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _context: CommandContext) -> Result<Value, CommandFailure> {
        Ok(json!({ "plugin": self.plugin, "generation": self.generation }))
    }
}

pub fn manager() -> PluginManager {
    manager_with(PluginManagerConfig::default())
}

pub fn manager_with(config: PluginManagerConfig) -> PluginManager {
    PluginManager::new(Arc::new(EventBus::new()), SharedCommandTable::new(), config)
}

pub async fn register(manager: &PluginManager, blueprints: &[&MockBlueprint]) {
    for blueprint in blueprints {
        manager.register(blueprint.factory()).await.unwrap();
    }
}

/// `(event name, payload["plugin"])` for every `plugin.*` event so far
pub fn plugin_events(manager: &PluginManager) -> Vec<(String, String)> {
    manager
        .bus()
        .timeline()
        .iter()
        .filter(|event| event.namespace() == "plugin")
        .map(|event| {
            (
                event.name.clone(),
                event.payload["plugin"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

/// Payload of the last event called `name`
pub fn last_event(manager: &PluginManager, name: &str) -> Option<Value> {
    manager
        .bus()
        .timeline()
        .iter()
        .filter(|event| event.name == name)
        .last()
        .map(|event| event.payload.clone())
}
