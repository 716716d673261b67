//! Command execution pipeline
//!
//! One run: resolve the command, validate the invocation, run pre-hooks,
//! run the body on a worker task under the deadline, run post-hooks and
//! produce a [`CommandResult`]. Every run gets a fresh correlation id that is
//! attached to all events it emits.
//!
//! A pipeline serves one interactive session and expects one command at a
//! time. It is `Send + Sync` and tracks in-flight runs by correlation id, so
//! [`CommandPipeline::cancel`] can be called from another task.

use crate::command::context::ExecutionContext;
use crate::command::error::{CommandFailure, PipelineError, PipelineResult};
use crate::command::table::{CommandDescriptor, SharedCommandTable};
use crate::command::traits::{HookOutcome, PostHook, PreHook};
use crate::command::types::{CommandError, CommandResult, Invocation, InvocationState};
use crate::core::cancellation::CancellationSignal;
use crate::notifications::api::{names, CorrelationId, Event, EventBus};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Default deadline for a command run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of results kept for lookup by correlation id
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub default_timeout: Duration,
    /// Resolve unique prefixes of command names
    pub prefix_matching: bool,
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            prefix_matching: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// A run that has not finished yet
#[derive(Debug, Clone)]
struct InFlight {
    command: String,
    signal: CancellationSignal,
}

/// Bookkeeping for one run
struct RunState {
    correlation_id: CorrelationId,
    command: String,
    plugin: Option<String>,
    state: InvocationState,
    started: Instant,
    hook_errors: Vec<String>,
}

impl RunState {
    fn advance(&mut self, next: InvocationState) {
        if !self.state.can_transition_to(next) {
            log::error!(
                "Pipeline: {} illegal transition {} -> {}",
                self.correlation_id,
                self.state,
                next
            );
        }
        log::trace!("Pipeline: {} {} -> {}", self.correlation_id, self.state, next);
        self.state = next;
    }
}

pub struct CommandPipeline {
    commands: SharedCommandTable,
    bus: Arc<EventBus>,
    config: PipelineConfig,
    pre_hooks: RwLock<Vec<Arc<dyn PreHook>>>,
    post_hooks: RwLock<Vec<Arc<dyn PostHook>>>,
    in_flight: Mutex<HashMap<CorrelationId, InFlight>>,
    history: Mutex<VecDeque<CommandResult>>,
}

impl std::fmt::Debug for CommandPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPipeline")
            .field("config", &self.config)
            .field("in_flight", &lock(&self.in_flight).len())
            .finish()
    }
}

impl CommandPipeline {
    pub fn new(commands: SharedCommandTable, bus: Arc<EventBus>, config: PipelineConfig) -> Self {
        Self {
            commands,
            bus,
            config,
            pre_hooks: RwLock::new(Vec::new()),
            post_hooks: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn commands(&self) -> &SharedCommandTable {
        &self.commands
    }

    /// Hooks run in registration order
    pub fn add_pre_hook(&self, hook: Arc<dyn PreHook>) {
        log::debug!("Pipeline: added pre-hook '{}'", hook.name());
        self.pre_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    pub fn add_post_hook(&self, hook: Arc<dyn PostHook>) {
        log::debug!("Pipeline: added post-hook '{}'", hook.name());
        self.post_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    pub async fn resolve(&self, name: &str) -> PipelineResult<CommandDescriptor> {
        self.commands.resolve(name, self.config.prefix_matching).await
    }

    /// Run a command from its parsed parts
    pub async fn execute(
        &self,
        name: &str,
        args: Vec<String>,
        flags: BTreeSet<String>,
        options: BTreeMap<String, String>,
    ) -> CommandResult {
        self.execute_invocation(Invocation {
            name: name.to_string(),
            args,
            flags,
            options,
        })
        .await
    }

    /// Run a command. Never fails: every error is captured in the result.
    pub async fn execute_invocation(&self, invocation: Invocation) -> CommandResult {
        let mut run = RunState {
            correlation_id: CorrelationId::new(),
            command: invocation.name.clone(),
            plugin: None,
            state: InvocationState::Received,
            started: Instant::now(),
            hook_errors: Vec::new(),
        };
        log::debug!("Pipeline: {} received '{}'", run.correlation_id, invocation.name);

        let outcome = match self.prepare(&mut run, invocation).await {
            Ok((descriptor, validated)) => {
                let signal = CancellationSignal::new();
                self.track(run.correlation_id, &descriptor.name, signal.clone());
                let outcome = self.run_phases(&mut run, &descriptor, validated, signal).await;
                self.untrack(run.correlation_id);
                outcome
            }
            Err(error) => Err(error),
        };

        self.finish(run, outcome)
    }

    /// Signal cooperative cancellation of one in-flight run
    pub fn cancel(&self, correlation_id: CorrelationId) -> bool {
        match lock(&self.in_flight).get(&correlation_id) {
            Some(in_flight) => {
                log::info!(
                    "Pipeline: cancelling '{}' ({})",
                    in_flight.command,
                    correlation_id
                );
                in_flight.signal.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight run; returns how many were signalled
    pub fn cancel_all(&self) -> usize {
        let in_flight = lock(&self.in_flight);
        for entry in in_flight.values() {
            entry.signal.cancel();
        }
        if !in_flight.is_empty() {
            log::info!("Pipeline: cancelled {} in-flight command(s)", in_flight.len());
        }
        in_flight.len()
    }

    /// In-flight runs as (correlation id, command name)
    pub fn active_invocations(&self) -> Vec<(CorrelationId, String)> {
        let mut active: Vec<_> = lock(&self.in_flight)
            .iter()
            .map(|(id, entry)| (*id, entry.command.clone()))
            .collect();
        active.sort();
        active
    }

    /// Result of a finished run, if still in the history
    pub fn result(&self, correlation_id: CorrelationId) -> Option<CommandResult> {
        lock(&self.history)
            .iter()
            .find(|r| r.correlation_id == correlation_id)
            .cloned()
    }

    /// Most recent results, newest last
    pub fn recent_results(&self, limit: usize) -> Vec<CommandResult> {
        let history = lock(&self.history);
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    async fn prepare(
        &self,
        run: &mut RunState,
        invocation: Invocation,
    ) -> PipelineResult<(CommandDescriptor, Invocation)> {
        let descriptor = self.resolve(&invocation.name).await?;
        run.advance(InvocationState::Resolved);
        run.command = descriptor.name.clone();
        run.plugin = Some(descriptor.plugin.clone());

        let validated = descriptor.schema.validate(&descriptor.name, &invocation)?;
        Ok((descriptor, validated))
    }

    async fn run_phases(
        &self,
        run: &mut RunState,
        descriptor: &CommandDescriptor,
        invocation: Invocation,
        signal: CancellationSignal,
    ) -> PipelineResult<Value> {
        let timeout = descriptor
            .handler
            .timeout()
            .unwrap_or(self.config.default_timeout);
        let mut context = ExecutionContext::new(
            run.correlation_id,
            descriptor,
            invocation,
            timeout,
            signal,
            Arc::clone(&self.bus),
        );
        let deadline = context.deadline();
        let timed_out = |phase| PipelineError::Timeout {
            command: descriptor.name.clone(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            phase,
        };

        self.emit(
            Event::with_payload(
                names::COMMAND_STARTED,
                json!({
                    "command": descriptor.name,
                    "plugin": descriptor.plugin,
                    "args": context.invocation().args,
                    "flags": context.invocation().flags,
                    "options": context.invocation().options,
                }),
            )
            .correlated(run.correlation_id),
        );

        run.advance(InvocationState::PreHooks);
        for hook in self.pre_hooks_snapshot() {
            if context.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    command: descriptor.name.clone(),
                });
            }
            let outcome = tokio::time::timeout_at(deadline, hook.before(&mut context))
                .await
                .map_err(|_| {
                    context.cancellation().cancel();
                    timed_out(InvocationState::PreHooks)
                })?;
            match outcome {
                Ok(HookOutcome::Continue) => {}
                Ok(HookOutcome::Abort(reason)) => {
                    return Err(PipelineError::HookAborted {
                        command: descriptor.name.clone(),
                        hook: hook.name().to_string(),
                        reason,
                    })
                }
                Err(cause) => {
                    return Err(PipelineError::HookFailed {
                        command: descriptor.name.clone(),
                        hook: hook.name().to_string(),
                        cause,
                    })
                }
            }
        }

        run.advance(InvocationState::Executing);
        let body = self.run_body(descriptor, &context, &timed_out).await?;

        run.advance(InvocationState::PostHooks);
        for hook in self.post_hooks_snapshot() {
            let outcome = tokio::time::timeout_at(deadline, hook.after(&mut context, &body))
                .await
                .map_err(|_| {
                    context.cancellation().cancel();
                    timed_out(InvocationState::PostHooks)
                })?;
            if let Err(error) = outcome {
                log::warn!(
                    "Pipeline: post-hook '{}' failed for '{}': {}",
                    hook.name(),
                    descriptor.name,
                    error
                );
                run.hook_errors.push(format!("{}: {}", hook.name(), error));
            }
        }

        body.map_err(|cause| PipelineError::CommandFailed {
            command: descriptor.name.clone(),
            cause,
        })
    }

    /// Run the body on a worker task; returns its own outcome, or a pipeline
    /// error when the deadline passed or the run was cancelled first.
    async fn run_body(
        &self,
        descriptor: &CommandDescriptor,
        context: &ExecutionContext,
        timed_out: impl Fn(InvocationState) -> PipelineError,
    ) -> PipelineResult<Result<Value, CommandFailure>> {
        let handler = Arc::clone(&descriptor.handler);
        let body_context = context.command_context();
        let signal = context.cancellation().clone();
        let mut task = tokio::spawn(async move { handler.run(body_context).await });

        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(PipelineError::Cancelled {
                command: descriptor.name.clone(),
            }),
            joined = &mut task => Ok(joined.unwrap_or_else(|join_error| {
                Err(CommandFailure::new(format!("command body aborted: {join_error}")))
            })),
            _ = tokio::time::sleep_until(context.deadline()) => {
                // The task keeps running detached; it only gets the signal
                signal.cancel();
                Err(timed_out(InvocationState::Executing))
            }
        }
    }

    fn finish(&self, mut run: RunState, outcome: PipelineResult<Value>) -> CommandResult {
        let terminal = match &outcome {
            Ok(_) | Err(PipelineError::HookAborted { .. }) => InvocationState::Completed,
            Err(PipelineError::Timeout { .. }) => InvocationState::TimedOut,
            Err(_) => InvocationState::Failed,
        };
        run.advance(terminal);

        let duration_ms = run.started.elapsed().as_millis() as u64;
        let (success, value, error) = match outcome {
            Ok(value) => (true, value, None),
            Err(error) => {
                log::debug!("Pipeline: {} {}", run.correlation_id, error);
                (false, Value::Null, Some(error))
            }
        };

        let result = CommandResult {
            success,
            value,
            error: error
                .as_ref()
                .map(|e| CommandError::from_pipeline(e, run.correlation_id)),
            duration_ms,
            correlation_id: run.correlation_id,
            command: run.command.clone(),
            state: terminal,
            hook_errors: std::mem::take(&mut run.hook_errors),
        };

        self.announce(&run, &result, error.as_ref());
        log::info!(
            "Pipeline: '{}' {} in {} ms ({})",
            result.command,
            result.state,
            result.duration_ms,
            result.correlation_id
        );

        let mut history = lock(&self.history);
        if self.config.history_limit > 0 {
            while history.len() >= self.config.history_limit {
                history.pop_front();
            }
            history.push_back(result.clone());
        }
        result
    }

    fn announce(&self, run: &RunState, result: &CommandResult, error: Option<&PipelineError>) {
        let base = json!({
            "command": result.command,
            "plugin": run.plugin,
            "success": result.success,
            "duration_ms": result.duration_ms,
        });

        if let Some(PipelineError::HookAborted { hook, reason, .. }) = error {
            self.emit(
                Event::with_payload(
                    names::COMMAND_ABORTED,
                    merge(&base, json!({ "hook": hook, "reason": reason })),
                )
                .correlated(run.correlation_id),
            );
        }

        let (name, extra) = match result.state {
            InvocationState::Completed => (names::COMMAND_COMPLETED, json!({ "value": result.value })),
            InvocationState::TimedOut => (
                names::COMMAND_TIMEOUT,
                json!({ "error": result.error.as_ref().map(|e| &e.message) }),
            ),
            _ => (
                names::COMMAND_FAILED,
                json!({
                    "kind": result.error.as_ref().map(|e| e.kind),
                    "error": result.error.as_ref().map(|e| &e.message),
                }),
            ),
        };
        self.emit(Event::with_payload(name, merge(&base, extra)).correlated(run.correlation_id));
    }

    fn emit(&self, event: Event) {
        let name = event.name.clone();
        if let Err(error) = self.bus.emit(event.from_source("pipeline")) {
            log::warn!("Pipeline: could not emit '{}': {}", name, error);
        }
    }

    fn track(&self, correlation_id: CorrelationId, command: &str, signal: CancellationSignal) {
        lock(&self.in_flight).insert(
            correlation_id,
            InFlight {
                command: command.to_string(),
                signal,
            },
        );
    }

    fn untrack(&self, correlation_id: CorrelationId) {
        lock(&self.in_flight).remove(&correlation_id);
    }

    fn pre_hooks_snapshot(&self) -> Vec<Arc<dyn PreHook>> {
        self.pre_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn post_hooks_snapshot(&self) -> Vec<Arc<dyn PostHook>> {
        self.post_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn merge(base: &Value, extra: Value) -> Value {
    let mut merged = base.clone();
    if let (Some(target), Value::Object(fields)) = (merged.as_object_mut(), extra) {
        target.extend(fields);
    }
    merged
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
