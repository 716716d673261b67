//! Command pipeline test suites

mod hooks;
mod timeout;

use crate::command::api::*;
use crate::notifications::api::EventBus;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a [`TestCommand`] body does
#[derive(Clone)]
pub(super) enum Behavior {
    /// Returns its arguments
    Echo,
    /// `Hello, <name>!`, upper-cased with `--shout`
    Greet,
    Fail(&'static str),
    /// Sleeps without looking at the cancellation signal
    Stall(Duration),
    /// Sleeps until cancelled, then records that it saw the signal
    Cooperative(Duration, Arc<AtomicBool>),
}

pub(super) struct TestCommand {
    pub name: &'static str,
    pub schema: CommandSchema,
    pub timeout: Option<Duration>,
    pub behavior: Behavior,
}

impl TestCommand {
    pub fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            schema: CommandSchema::permissive(),
            timeout: None,
            behavior,
        }
    }

    pub fn with_schema(mut self, schema: CommandSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn shared(self) -> Arc<dyn Command> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl Command for TestCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn schema(&self) -> CommandSchema {
        self.schema.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure> {
        match &self.behavior {
            Behavior::Echo => Ok(json!(context.args())),
            Behavior::Greet => {
                let name = context.option("name").unwrap_or("world");
                let greeting = format!("Hello, {name}!");
                if context.has_flag("shout") {
                    Ok(json!(greeting.to_uppercase()))
                } else {
                    Ok(json!(greeting))
                }
            }
            Behavior::Fail(message) => Err(CommandFailure::new(*message)),
            Behavior::Stall(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(json!("finished"))
            }
            Behavior::Cooperative(duration, observed) => {
                tokio::select! {
                    _ = tokio::time::sleep(*duration) => Ok(json!("finished")),
                    _ = context.cancelled() => {
                        observed.store(true, Ordering::SeqCst);
                        Err(CommandFailure::new("cancelled"))
                    }
                }
            }
        }
    }
}

/// Pipeline over a table holding `commands` registered by plugin `test`
pub(super) async fn pipeline_with(
    commands: Vec<Arc<dyn Command>>,
    config: PipelineConfig,
) -> (CommandPipeline, Arc<EventBus>) {
    let table = SharedCommandTable::new();
    table.write().await.register_all("test", commands).unwrap();
    let bus = Arc::new(EventBus::new());
    let pipeline = CommandPipeline::new(table, Arc::clone(&bus), config);
    (pipeline, bus)
}
