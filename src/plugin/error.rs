//! Plugin Error Handling
//!
//! Error types for registration, dependency resolution, lifecycle transitions
//! and the command map contributed by active plugins.

use crate::command::api::PipelineError;
use crate::core::error_handling::{ContextualError, ErrorKind, Severity};
use crate::notifications::api::EventBusError;
use crate::plugin::types::PluginState;

/// Result type alias for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin '{plugin_name}' is already registered")]
    DuplicatePlugin { plugin_name: String },

    #[error("Plugin '{plugin_name}' has an invalid dependency on '{dependency}': {reason}")]
    InvalidDependency {
        plugin_name: String,
        dependency: String,
        reason: String,
    },

    #[error("Cyclic plugin dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Plugin '{plugin_name}' targets API {plugin_api}, host provides {host_api}")]
    IncompatibleApi {
        plugin_name: String,
        plugin_api: u32,
        host_api: u32,
    },

    #[error("Plugin '{plugin_name}' failed to initialize: {cause}")]
    InitFailed { plugin_name: String, cause: String },

    #[error("Plugin '{plugin_name}' is still required by: {}", .dependents.join(", "))]
    DependentsStillActive {
        plugin_name: String,
        dependents: Vec<String>,
    },

    #[error("Plugin not found: {plugin_name}")]
    PluginNotFound { plugin_name: String },

    #[error("Cannot {operation} plugin '{plugin_name}' while it is {state}")]
    InvalidState {
        plugin_name: String,
        state: PluginState,
        operation: String,
    },

    #[error("Plugin '{plugin_name}' needs '{dependency}', which is {state}")]
    DependencyUnavailable {
        plugin_name: String,
        dependency: String,
        state: PluginState,
    },

    #[error("Plugin '{plugin_name}' could not register its commands: {cause}")]
    CommandConflict {
        plugin_name: String,
        #[source]
        cause: PipelineError,
    },

    #[error("Reload of plugin '{plugin_name}' failed ({}): {cause}", restoration_note(.restored))]
    ReloadFailed {
        plugin_name: String,
        restored: bool,
        cause: String,
    },

    #[error("Plugin registry corrupted: {detail}")]
    RegistryCorrupted { detail: String },

    #[error("Plugin '{plugin_name}' subscription failed: {cause}")]
    Subscription {
        plugin_name: String,
        #[source]
        cause: EventBusError,
    },

    #[error("Invalid settings for plugin '{plugin_name}': {reason}")]
    Settings { plugin_name: String, reason: String },
}

fn restoration_note(restored: &bool) -> &'static str {
    if *restored {
        "previous instance restored"
    } else {
        "plugin left unloaded"
    }
}

impl PluginError {
    /// Plugin the error is about, if it concerns a single one
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            PluginError::CyclicDependency { .. } | PluginError::RegistryCorrupted { .. } => None,
            PluginError::DuplicatePlugin { plugin_name }
            | PluginError::InvalidDependency { plugin_name, .. }
            | PluginError::IncompatibleApi { plugin_name, .. }
            | PluginError::InitFailed { plugin_name, .. }
            | PluginError::DependentsStillActive { plugin_name, .. }
            | PluginError::PluginNotFound { plugin_name }
            | PluginError::InvalidState { plugin_name, .. }
            | PluginError::DependencyUnavailable { plugin_name, .. }
            | PluginError::CommandConflict { plugin_name, .. }
            | PluginError::ReloadFailed { plugin_name, .. }
            | PluginError::Subscription { plugin_name, .. }
            | PluginError::Settings { plugin_name, .. } => Some(plugin_name),
        }
    }
}

impl ContextualError for PluginError {
    fn kind(&self) -> ErrorKind {
        match self {
            PluginError::DuplicatePlugin { .. } => ErrorKind::DuplicatePlugin,
            PluginError::InvalidDependency { .. } => ErrorKind::InvalidDependency,
            PluginError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            PluginError::IncompatibleApi { .. } => ErrorKind::IncompatibleApi,
            PluginError::InitFailed { .. } => ErrorKind::PluginInitFailed,
            PluginError::DependentsStillActive { .. } => ErrorKind::DependentsStillActive,
            PluginError::PluginNotFound { .. } => ErrorKind::PluginNotFound,
            PluginError::InvalidState { .. } => ErrorKind::InvalidState,
            PluginError::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
            PluginError::CommandConflict { .. } => ErrorKind::CommandConflict,
            PluginError::ReloadFailed { .. } => ErrorKind::ReloadFailed,
            PluginError::RegistryCorrupted { .. } => ErrorKind::RegistryCorrupted,
            PluginError::Subscription { cause, .. } => cause.kind(),
            PluginError::Settings { .. } => ErrorKind::Configuration,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            PluginError::InitFailed { .. } | PluginError::DependencyUnavailable { .. } => {
                Severity::Warning
            }
            PluginError::RegistryCorrupted { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            PluginError::DuplicatePlugin { .. }
                | PluginError::InvalidDependency { .. }
                | PluginError::CyclicDependency { .. }
                | PluginError::IncompatibleApi { .. }
                | PluginError::DependentsStillActive { .. }
                | PluginError::PluginNotFound { .. }
                | PluginError::InvalidState { .. }
                | PluginError::Settings { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let error = PluginError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "Cyclic plugin dependency: a -> b -> a");
        assert_eq!(error.kind(), ErrorKind::CyclicDependency);
        assert!(error.plugin_name().is_none());
    }

    #[test]
    fn test_reload_message_reports_restoration() {
        let restored = PluginError::ReloadFailed {
            plugin_name: "greeter".into(),
            restored: true,
            cause: "boom".into(),
        };
        assert_eq!(
            restored.to_string(),
            "Reload of plugin 'greeter' failed (previous instance restored): boom"
        );

        let lost = PluginError::ReloadFailed {
            plugin_name: "greeter".into(),
            restored: false,
            cause: "boom".into(),
        };
        assert!(lost.to_string().contains("plugin left unloaded"));
    }

    #[test]
    fn test_severities() {
        let init = PluginError::InitFailed {
            plugin_name: "c".into(),
            cause: "no config".into(),
        };
        assert_eq!(init.severity(), Severity::Warning);

        let corrupted = PluginError::RegistryCorrupted {
            detail: "two owners".into(),
        };
        assert_eq!(corrupted.severity(), Severity::Fatal);
        assert!(!corrupted.is_user_actionable());
    }

    #[test]
    fn test_dependents_listed() {
        let error = PluginError::DependentsStillActive {
            plugin_name: "core".into(),
            dependents: vec!["greeter".into(), "audit".into()],
        };
        assert_eq!(
            error.to_string(),
            "Plugin 'core' is still required by: greeter, audit"
        );
        assert_eq!(error.plugin_name(), Some("core"));
    }
}
