//! Command and hook contracts

use crate::command::context::{CommandContext, ExecutionContext};
use crate::command::error::{CommandFailure, HookError};
use crate::command::schema::CommandSchema;
use serde_json::Value;
use std::time::Duration;

/// A named, invokable unit of behavior contributed by a plugin
///
/// The body runs on a worker task. Bodies that can take long should poll
/// [`CommandContext::is_cancelled`] or select on [`CommandContext::cancelled`];
/// on timeout the pipeline signals cancellation and stops waiting, it never
/// kills the task. Re-running a body after a timeout is not guaranteed to be
/// safe unless the command says so in its description.
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Alternative names that resolve to this command
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }

    /// Accepted arguments, flags and options. The default accepts anything.
    fn schema(&self) -> CommandSchema {
        CommandSchema::permissive()
    }

    /// Per-command deadline overriding the pipeline default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, context: CommandContext) -> Result<Value, CommandFailure>;
}

/// Decision of a pre-hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Skip the body; the invocation completes with this reason
    Abort(String),
}

/// Runs before the command body, in registration order
#[async_trait::async_trait]
pub trait PreHook: Send + Sync {
    fn name(&self) -> &str;

    async fn before(&self, context: &mut ExecutionContext) -> Result<HookOutcome, HookError>;
}

/// Runs after the command body, whether it succeeded or failed
///
/// Post-hooks never run when a pre-hook aborted, and their failures never
/// change the outcome of the invocation.
#[async_trait::async_trait]
pub trait PostHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after(
        &self,
        context: &mut ExecutionContext,
        outcome: &Result<Value, CommandFailure>,
    ) -> Result<(), HookError>;
}
