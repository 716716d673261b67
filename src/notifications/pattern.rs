//! Subscription patterns
//!
//! `plugin.loaded` matches exactly, `plugin.*` matches every event in the
//! `plugin` namespace (at any depth) and `*` matches everything.

use crate::notifications::error::{EventBusError, EventBusResult};
use std::fmt;
use std::str::FromStr;

/// Event-name pattern used by subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventPattern {
    /// `*`
    Any,
    /// `plugin.loaded`
    Exact(String),
    /// `plugin.*`, stored without the wildcard
    Namespace(String),
}

impl EventPattern {
    pub fn parse(pattern: &str) -> EventBusResult<Self> {
        let invalid = |reason: &str| EventBusError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern == "*" {
            return Ok(EventPattern::Any);
        }
        if let Some(namespace) = pattern.strip_suffix(".*") {
            if !is_valid_event_name(namespace) {
                return Err(invalid("namespace must be dot-separated name segments"));
            }
            return Ok(EventPattern::Namespace(namespace.to_string()));
        }
        if pattern.contains('*') {
            return Err(invalid("'*' is only allowed as a trailing '.*' segment"));
        }
        if !is_valid_event_name(pattern) {
            return Err(invalid("event names are dot-separated [A-Za-z0-9_-] segments"));
        }
        Ok(EventPattern::Exact(pattern.to_string()))
    }

    pub fn matches(&self, event_name: &str) -> bool {
        match self {
            EventPattern::Any => true,
            EventPattern::Exact(name) => name == event_name,
            EventPattern::Namespace(namespace) => event_name
                .strip_prefix(namespace.as_str())
                .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1),
        }
    }
}

/// True for names like `plugin.loaded` or `greeter.said-hello`
pub fn is_valid_event_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

impl FromStr for EventPattern {
    type Err = EventBusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventPattern::parse(s)
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPattern::Any => write!(f, "*"),
            EventPattern::Exact(name) => write!(f, "{name}"),
            EventPattern::Namespace(namespace) => write!(f, "{namespace}.*"),
        }
    }
}
