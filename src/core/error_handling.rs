//! Generic error handling utilities
//!
//! Every subsystem error carries a machine-distinguishable [`ErrorKind`], a
//! [`Severity`] and enough context to render a human-readable message. The
//! [`ContextualError`] trait exposes these uniformly so results, events and
//! logs can treat plugin, pipeline and event bus errors alike.

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// How badly an error affects the host
///
/// - `Warning`: the operation proceeds degraded (one plugin failed, others loaded)
/// - `Error`: the specific operation failed but the process continues
/// - `Fatal`: continued operation is unsafe (corrupted internal state)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, IntoStaticStr,
)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// Machine-distinguishable error kinds shared by all subsystems
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum ErrorKind {
    // Plugin lifecycle
    DuplicatePlugin,
    InvalidDependency,
    CyclicDependency,
    PluginInitFailed,
    DependentsStillActive,
    PluginNotFound,
    InvalidState,
    DependencyUnavailable,
    IncompatibleApi,
    CommandConflict,
    ReloadFailed,
    RegistryCorrupted,
    // Command pipeline
    UnknownCommand,
    AmbiguousCommand,
    InvalidArguments,
    HookAborted,
    HookFailed,
    CommandFailed,
    Cancelled,
    Timeout,
    // Event bus
    EventLoopDetected,
    HandlerError,
    InvalidPattern,
    // Host
    Configuration,
}

/// Trait for errors that carry kind, severity and user-facing detail
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)` with a helpful, actionable message. System errors return
/// `None` and are reported with generic context plus debug details.
pub trait ContextualError: std::error::Error {
    /// Machine-distinguishable kind of this error
    fn kind(&self) -> ErrorKind;

    /// Severity of this error
    fn severity(&self) -> Severity {
        Severity::Error
    }

    /// Returns true if the message is specific enough to show to the user as-is
    ///
    /// Examples of user-actionable errors:
    /// - Unknown or ambiguous command names
    /// - Invalid arguments
    /// - Configuration errors with clear fixes
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<String> {
        if self.is_user_actionable() {
            Some(self.to_string())
        } else {
            None
        }
    }
}

/// Log errors with appropriate level and detail based on severity
///
/// User-actionable errors show their own message; system errors show the
/// operation context. Details always go to debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    let headline = error
        .user_message()
        .unwrap_or_else(|| format!("{operation_context} failed"));

    match error.severity() {
        Severity::Warning => log::warn!("{} [{}]", headline, error.kind()),
        Severity::Error => log::error!("{} [{}]", headline, error.kind()),
        Severity::Fatal => log::error!("FATAL: {} [{}]", headline, error.kind()),
    }
    log::debug!("DETAIL: {}: {}", operation_context, error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
