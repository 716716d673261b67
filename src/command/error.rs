//! Command pipeline error types

use crate::command::types::InvocationState;
use crate::core::error_handling::{ContextualError, ErrorKind, Severity};

/// Failure reported by a command body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CommandFailure {
    pub message: String,
    /// Optional structured detail carried into the result
    pub details: Option<serde_json::Value>,
}

impl CommandFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Failure reported by a pre- or post-hook
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown command: '{name}'")]
    UnknownCommand { name: String },

    #[error("Ambiguous command '{name}' matches: {}. Use the full name or 'plugin:command'.", .candidates.join(", "))]
    AmbiguousCommand {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Command '{command}' from plugin '{plugin}' conflicts with '{existing}' registered by '{existing_owner}'")]
    CommandConflict {
        command: String,
        plugin: String,
        existing: String,
        existing_owner: String,
    },

    #[error("Invalid alias '{alias}': {reason}")]
    InvalidAlias { alias: String, reason: String },

    #[error("Invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("Command '{command}' aborted by hook '{hook}': {reason}")]
    HookAborted {
        command: String,
        hook: String,
        reason: String,
    },

    #[error("Hook '{hook}' failed for '{command}': {cause}")]
    HookFailed {
        command: String,
        hook: String,
        #[source]
        cause: HookError,
    },

    #[error("Command '{command}' failed: {cause}")]
    CommandFailed {
        command: String,
        #[source]
        cause: CommandFailure,
    },

    #[error("Command '{command}' timed out after {timeout_ms} ms during {phase}")]
    Timeout {
        command: String,
        timeout_ms: u64,
        phase: InvocationState,
    },

    #[error("Command '{command}' was cancelled")]
    Cancelled { command: String },
}

impl PipelineError {
    /// Name of the command this error refers to, if any
    pub fn command(&self) -> &str {
        match self {
            PipelineError::UnknownCommand { name }
            | PipelineError::AmbiguousCommand { name, .. } => name,
            PipelineError::InvalidAlias { alias, .. } => alias,
            PipelineError::CommandConflict { command, .. }
            | PipelineError::InvalidArguments { command, .. }
            | PipelineError::HookAborted { command, .. }
            | PipelineError::HookFailed { command, .. }
            | PipelineError::CommandFailed { command, .. }
            | PipelineError::Timeout { command, .. }
            | PipelineError::Cancelled { command } => command,
        }
    }
}

impl ContextualError for PipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            PipelineError::AmbiguousCommand { .. } => ErrorKind::AmbiguousCommand,
            PipelineError::CommandConflict { .. } => ErrorKind::CommandConflict,
            PipelineError::InvalidAlias { .. } => ErrorKind::Configuration,
            PipelineError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            PipelineError::HookAborted { .. } => ErrorKind::HookAborted,
            PipelineError::HookFailed { .. } => ErrorKind::HookFailed,
            PipelineError::CommandFailed { .. } => ErrorKind::CommandFailed,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            PipelineError::HookAborted { .. } | PipelineError::Cancelled { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownCommand { .. }
                | PipelineError::AmbiguousCommand { .. }
                | PipelineError::InvalidAlias { .. }
                | PipelineError::InvalidArguments { .. }
                | PipelineError::HookAborted { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
