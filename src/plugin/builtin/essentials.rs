//! The `core` plugin
//!
//! Utility commands every host has (`echo`, `sleep`, `timeline`) and a
//! debug log of plugin lifecycle events.

use crate::builtin;
use crate::command::api::{Command, CommandContext, CommandFailure, CommandSchema};
use crate::notifications::api::{Event, EventPattern, SubscriptionHandle};
use crate::plugin::context::PluginContext;
use crate::plugin::error::PluginResult;
use crate::plugin::traits::Plugin;
use crate::plugin::types::PluginInfo;
use semver::Version;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const PLUGIN_NAME: &str = "core";

#[derive(Debug, Default)]
pub struct CorePlugin {
    lifecycle_log: Option<SubscriptionHandle>,
}

#[async_trait::async_trait]
impl Plugin for CorePlugin {
    fn plugin_info(&self) -> PluginInfo {
        PluginInfo::new(PLUGIN_NAME, Version::new(0, 1, 0))
            .with_description("Built-in utility commands")
            .with_author("plughost")
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![Arc::new(Echo), Arc::new(Sleep), Arc::new(TimelineCommand)]
    }

    async fn initialize(&mut self, context: &PluginContext) -> PluginResult<()> {
        let handle = context.subscribe("plugin.*", |event: &Event| {
            log::debug!("core: {} {}", event.name, event.payload);
            Ok(())
        })?;
        self.lifecycle_log = Some(handle);
        Ok(())
    }

    async fn cleanup(&mut self) -> PluginResult<()> {
        self.lifecycle_log = None;
        Ok(())
    }
}

fn create_plugin() -> Box<dyn Plugin> {
    Box::new(CorePlugin::default())
}

builtin!(create_plugin);

struct Echo;

#[async_trait::async_trait]
impl Command for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Print the arguments"
    }

    fn schema(&self) -> CommandSchema {
        CommandSchema::new()
            .variadic("text", "Words to print")
            .flag("upper", "Upper-case the output")
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        let text = context.args().join(" ");
        if context.has_flag("upper") {
            Ok(json!(text.to_uppercase()))
        } else {
            Ok(json!(text))
        }
    }
}

struct Sleep;

#[async_trait::async_trait]
impl Command for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Wait for the given number of milliseconds (cancellable, safe to re-run)"
    }

    fn schema(&self) -> CommandSchema {
        CommandSchema::new().arg("ms", true, "Milliseconds to wait")
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        let raw = context.arg(0).unwrap_or_default();
        let ms: u64 = raw
            .parse()
            .map_err(|_| CommandFailure::new(format!("'{raw}' is not a number of milliseconds")))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(json!({ "slept_ms": ms })),
            _ = context.cancelled() => Err(CommandFailure::new("interrupted")),
        }
    }
}

struct TimelineCommand;

#[async_trait::async_trait]
impl Command for TimelineCommand {
    fn name(&self) -> &str {
        "timeline"
    }

    fn description(&self) -> &str {
        "Show recent events"
    }

    fn aliases(&self) -> Vec<String> {
        vec!["events".to_string()]
    }

    fn schema(&self) -> CommandSchema {
        CommandSchema::new()
            .option("limit", Some("20"), "Number of events to show")
            .option("pattern", Some("*"), "Only events matching this pattern")
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        let limit: usize = context
            .option("limit")
            .unwrap_or("20")
            .parse()
            .map_err(|_| CommandFailure::new("--limit must be a number"))?;
        let pattern = EventPattern::parse(context.option("pattern").unwrap_or("*"))
            .map_err(|e| CommandFailure::new(e.to_string()))?;

        let timeline = context.bus().timeline();
        let mut events: Vec<Value> = timeline
            .iter()
            .rev()
            .filter(|event| pattern.matches(&event.name))
            .take(limit)
            .map(|event| {
                json!({
                    "name": event.name,
                    "timestamp": chrono::DateTime::<chrono::Utc>::from(event.timestamp).to_rfc3339(),
                    "correlation_id": event.correlation_id,
                    "source": event.source,
                })
            })
            .collect();
        events.reverse();
        Ok(Value::Array(events))
    }
}
