//! Execution context handed to hooks and command bodies
//!
//! [`ExecutionContext`] is owned by exactly one pipeline run. Hooks get it
//! mutably and may exchange data through its scratch map; the command body
//! gets a cloneable [`CommandContext`] view taken after the pre-hooks ran.

use crate::command::table::CommandDescriptor;
use crate::command::types::Invocation;
use crate::core::cancellation::CancellationSignal;
use crate::notifications::api::{CorrelationId, Event, EventBus, EventBusResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline used when `started + timeout` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct ExecutionContext {
    correlation_id: CorrelationId,
    command: String,
    plugin: String,
    invocation: Arc<Invocation>,
    scratch: HashMap<String, Value>,
    started: Instant,
    deadline: Instant,
    cancellation: CancellationSignal,
    bus: Arc<EventBus>,
}

fn deadline_after(started: Instant, timeout: Duration) -> Instant {
    started
        .checked_add(timeout)
        .or_else(|| started.checked_add(FAR_FUTURE))
        .unwrap_or(started)
}

impl ExecutionContext {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        descriptor: &CommandDescriptor,
        invocation: Invocation,
        timeout: Duration,
        cancellation: CancellationSignal,
        bus: Arc<EventBus>,
    ) -> Self {
        let started = Instant::now();
        Self {
            correlation_id,
            command: descriptor.name.clone(),
            plugin: descriptor.plugin.clone(),
            invocation: Arc::new(invocation),
            scratch: HashMap::new(),
            started,
            deadline: deadline_after(started, timeout),
            cancellation,
            bus,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Name of the plugin that owns the command
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Immutable snapshot of the parsed command line
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn scratch(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn set_scratch(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.scratch.insert(key.into(), value)
    }

    pub fn remove_scratch(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emit an event correlated with this invocation
    pub fn emit(&self, name: &str, payload: Value) -> EventBusResult<()> {
        self.bus.emit(
            Event::with_payload(name, payload)
                .correlated(self.correlation_id)
                .from_source(self.plugin.as_str()),
        )
    }

    /// View handed to the command body
    pub(crate) fn command_context(&self) -> CommandContext {
        CommandContext {
            correlation_id: self.correlation_id,
            command: self.command.clone(),
            plugin: self.plugin.clone(),
            invocation: Arc::clone(&self.invocation),
            scratch: Arc::new(self.scratch.clone()),
            deadline: self.deadline,
            cancellation: self.cancellation.clone(),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("correlation_id", &self.correlation_id)
            .field("command", &self.command)
            .field("plugin", &self.plugin)
            .field("invocation", &self.invocation)
            .field("scratch", &self.scratch.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a command body sees of its invocation
#[derive(Clone)]
pub struct CommandContext {
    correlation_id: CorrelationId,
    command: String,
    plugin: String,
    invocation: Arc<Invocation>,
    scratch: Arc<HashMap<String, Value>>,
    deadline: Instant,
    cancellation: CancellationSignal,
    bus: Arc<EventBus>,
}

impl CommandContext {
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn args(&self) -> &[String] {
        &self.invocation.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.invocation.arg(index)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.invocation.option(key)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.invocation.has_flag(flag)
    }

    /// Value left by a pre-hook
    pub fn scratch(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the pipeline cancels this invocation (timeout or explicit cancel).
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Read-only access to the bus, e.g. for inspecting the timeline
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Emit an event correlated with this invocation
    pub fn emit(&self, name: &str, payload: Value) -> EventBusResult<()> {
        self.bus.emit(
            Event::with_payload(name, payload)
                .correlated(self.correlation_id)
                .from_source(self.plugin.as_str()),
        )
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("correlation_id", &self.correlation_id)
            .field("command", &self.command)
            .field("invocation", &self.invocation)
            .finish()
    }
}
