//! Invocation data and structured results

use crate::command::error::PipelineError;
use crate::core::error_handling::{ContextualError, ErrorKind, Severity};
use crate::notifications::api::CorrelationId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, IntoStaticStr};

/// Parsed command line handed to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
    pub flags: BTreeSet<String>,
    pub options: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Per-invocation state machine
///
/// `Received → Resolved → PreHooks → Executing → PostHooks → Completed`, with
/// `Failed` reachable from any non-terminal state and `TimedOut` from the
/// three phases that run under the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
pub enum InvocationState {
    Received,
    Resolved,
    PreHooks,
    Executing,
    PostHooks,
    Completed,
    Failed,
    TimedOut,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::Completed | InvocationState::Failed | InvocationState::TimedOut
        )
    }

    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed) => true,
            (PreHooks | Executing | PostHooks, TimedOut) => true,
            (Received, Resolved)
            | (Resolved, PreHooks)
            | (PreHooks, Executing)
            | (PreHooks, Completed)
            | (Executing, PostHooks)
            | (PostHooks, Completed) => true,
            _ => false,
        }
    }
}

/// Error section of a [`CommandResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub command: String,
    pub correlation_id: CorrelationId,
    pub cause: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl CommandError {
    pub fn from_pipeline(error: &PipelineError, correlation_id: CorrelationId) -> Self {
        let (cause, details) = match error {
            PipelineError::CommandFailed { cause, .. } => {
                (Some(cause.message.clone()), cause.details.clone())
            }
            PipelineError::HookFailed { cause, .. } => (Some(cause.message.clone()), None),
            PipelineError::HookAborted { reason, .. } => (Some(reason.clone()), None),
            _ => (None, None),
        };
        Self {
            kind: error.kind(),
            severity: error.severity(),
            message: error.to_string(),
            command: error.command().to_string(),
            correlation_id,
            cause,
            details,
        }
    }
}

/// Structured outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub value: serde_json::Value,
    pub error: Option<CommandError>,
    pub duration_ms: u64,
    pub correlation_id: CorrelationId,
    /// Resolved command name, or the input when resolution failed
    pub command: String,
    pub state: InvocationState,
    /// Post-hook failures; these never change `success`
    pub hook_errors: Vec<String>,
}

impl CommandResult {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn is_timeout(&self) -> bool {
        self.state == InvocationState::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::error::CommandFailure;
    use InvocationState::*;

    #[test]
    fn test_invocation_builder() {
        let invocation = Invocation::new("greet")
            .with_arg("friend")
            .with_flag("shout")
            .with_option("name", "Ada");

        assert_eq!(invocation.arg(0), Some("friend"));
        assert!(invocation.has_flag("shout"));
        assert_eq!(invocation.option("name"), Some("Ada"));
        assert_eq!(invocation.option("missing"), None);
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [Received, Resolved, PreHooks, Executing, PostHooks, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_abort_short_circuits_to_completed() {
        assert!(PreHooks.can_transition_to(Completed));
        assert!(!Executing.can_transition_to(Completed));
    }

    #[test]
    fn test_timeout_only_from_deadline_phases() {
        assert!(PreHooks.can_transition_to(TimedOut));
        assert!(Executing.can_transition_to(TimedOut));
        assert!(PostHooks.can_transition_to(TimedOut));
        assert!(!Received.can_transition_to(TimedOut));
        assert!(!Resolved.can_transition_to(TimedOut));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Completed, Failed, TimedOut] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Failed));
        }
        assert!(Received.can_transition_to(Failed));
    }

    #[test]
    fn test_command_error_carries_nested_cause() {
        let id = CorrelationId::new();
        let error = PipelineError::CommandFailed {
            command: "deploy".to_string(),
            cause: CommandFailure::new("unreachable").with_details(serde_json::json!({"host": "a"})),
        };

        let rendered = CommandError::from_pipeline(&error, id);
        assert_eq!(rendered.kind, ErrorKind::CommandFailed);
        assert_eq!(rendered.cause.as_deref(), Some("unreachable"));
        assert_eq!(rendered.details, Some(serde_json::json!({"host": "a"})));
        assert_eq!(rendered.correlation_id, id);
    }
}
