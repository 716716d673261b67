//! Error types for the event bus

use crate::core::error_handling::{ContextualError, ErrorKind, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    #[error("Event loop detected: '{event_name}' re-emitted {depth} times (limit {limit})")]
    EventLoopDetected {
        event_name: String,
        depth: usize,
        limit: usize,
    },

    #[error("Handler '{owner}' failed on '{event_name}': {cause}")]
    HandlerError {
        event_name: String,
        owner: String,
        cause: String,
    },

    #[error("Invalid event pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl ContextualError for EventBusError {
    fn kind(&self) -> ErrorKind {
        match self {
            EventBusError::EventLoopDetected { .. } => ErrorKind::EventLoopDetected,
            EventBusError::HandlerError { .. } => ErrorKind::HandlerError,
            EventBusError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            EventBusError::HandlerError { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    fn is_user_actionable(&self) -> bool {
        matches!(self, EventBusError::InvalidPattern { .. })
    }
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;
