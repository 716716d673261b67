//! Event types for the event bus

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Well-known event names published by the host
pub mod names {
    pub const PLUGIN_REGISTERED: &str = "plugin.registered";
    pub const PLUGIN_LOADED: &str = "plugin.loaded";
    pub const PLUGIN_FAILED: &str = "plugin.failed";
    pub const PLUGIN_BLOCKED: &str = "plugin.blocked";
    pub const PLUGIN_UNLOADED: &str = "plugin.unloaded";
    pub const PLUGIN_RELOADED: &str = "plugin.reloaded";

    pub const COMMAND_STARTED: &str = "command.started";
    pub const COMMAND_ABORTED: &str = "command.aborted";
    pub const COMMAND_COMPLETED: &str = "command.completed";
    pub const COMMAND_FAILED: &str = "command.failed";
    pub const COMMAND_TIMEOUT: &str = "command.timeout";

    pub const HANDLER_ERROR: &str = "event.handler.error";
}

/// Opaque token linking an invocation to the events it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A published event. Immutable once handed to the bus.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
    pub timestamp: SystemTime,
    pub correlation_id: Option<CorrelationId>,
    /// Plugin or component that published the event
    pub source: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_payload(name, serde_json::Value::Null)
    }

    pub fn with_payload(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: SystemTime::now(),
            correlation_id: None,
            source: None,
        }
    }

    pub fn correlated(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attach an optional correlation id (no-op for `None`)
    pub fn correlated_opt(mut self, correlation_id: Option<CorrelationId>) -> Self {
        if correlation_id.is_some() {
            self.correlation_id = correlation_id;
        }
        self
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Leading namespace segment: `plugin` for `plugin.loaded`
    pub fn namespace(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}
