//! Handler trait and per-subscription statistics

use crate::notifications::error::EventBusError;
use crate::notifications::event::Event;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error returned by an event handler. Caught by the bus, never propagated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<EventBusError> for HandlerError {
    fn from(error: EventBusError) -> Self {
        Self::new(error.to_string())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Synchronous event handler
///
/// Handlers run on the emitting thread in subscription order and may emit
/// further events through a bus handle they captured.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// Delivery counters for one subscription
#[derive(Debug, Default)]
pub struct SubscriberStatistics {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl SubscriberStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_handlers() {
        let handler = |event: &Event| -> HandlerResult {
            if event.name == "bad" {
                Err(HandlerError::new("rejected"))
            } else {
                Ok(())
            }
        };

        assert!(handler.handle(&Event::new("good")).is_ok());
        let err = handler.handle(&Event::new("bad")).unwrap_err();
        assert_eq!(err.message(), "rejected");
    }

    #[test]
    fn test_statistics_count_independently() {
        let stats = SubscriberStatistics::new();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_failure();

        assert_eq!(stats.delivered(), 2);
        assert_eq!(stats.failed(), 1);
    }
}
