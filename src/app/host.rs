//! Wires the bus, the plugin manager and the command pipeline together
//!
//! One bus and one command table are shared: the manager writes the table as
//! plugins come and go, the pipeline reads it for every invocation.

use crate::app::cli::config::HostConfig;
use crate::app::cli::parsing::parse_invocation;
use crate::command::api::{CommandPipeline, CommandResult, PipelineResult, SharedCommandTable};
use crate::notifications::api::EventBus;
use crate::plugin::api::{LoadReport, PluginManager, PluginResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Host {
    bus: Arc<EventBus>,
    manager: PluginManager,
    pipeline: CommandPipeline,
    aliases: BTreeMap<String, String>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("manager", &self.manager).finish()
    }
}

impl Host {
    pub fn new(config: &HostConfig) -> Self {
        let bus = Arc::new(EventBus::with_config(config.bus.clone()));
        let commands = SharedCommandTable::new();
        let manager = PluginManager::new(Arc::clone(&bus), commands.clone(), config.plugins.clone());
        let pipeline = CommandPipeline::new(commands, Arc::clone(&bus), config.pipeline.clone());
        Self {
            bus,
            manager,
            pipeline,
            aliases: config.aliases.clone(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn pipeline(&self) -> &CommandPipeline {
        &self.pipeline
    }

    /// Register the builtin plugins, load everything that is enabled and
    /// install the configured user aliases
    pub async fn start(&self) -> PluginResult<LoadReport> {
        let registered = self.manager.register_builtins().await?;
        log::debug!("Host: {} builtin plugin(s) registered", registered);
        let report = self.manager.load_all().await?;
        self.install_aliases().await;
        Ok(report)
    }

    /// Add every configured alias the command table accepts; returns how
    /// many were installed. Rejected aliases are logged and skipped.
    pub async fn install_aliases(&self) -> usize {
        let mut commands = self.pipeline.commands().write().await;
        let mut installed = 0;
        for (alias, target) in &self.aliases {
            match commands.add_user_alias(alias, target) {
                Ok(()) => installed += 1,
                Err(e) => log::warn!("Host: skipping alias: {}", e),
            }
        }
        installed
    }

    /// Parse a command line and run it through the pipeline
    pub async fn run(&self, tokens: &[String]) -> PipelineResult<CommandResult> {
        let invocation = parse_invocation(tokens)?;
        Ok(self.pipeline.execute_invocation(invocation).await)
    }

    /// Cancel anything still running and unload every plugin
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.pipeline.cancel_all();
        if cancelled > 0 {
            log::info!("Host: cancelled {} running command(s)", cancelled);
        }
        self.manager.shutdown().await
    }
}
