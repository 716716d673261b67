//! Synchronous publish/subscribe event bus
//!
//! Delivery happens on the emitting thread, in subscription order, before
//! `emit` returns. The subscription table is a copy-on-write snapshot so
//! handlers may subscribe or unsubscribe while an event is being delivered.
//! Re-entrant emission is bounded by a per-thread, per-event-name depth counter.

use crate::notifications::error::{EventBusError, EventBusResult};
use crate::notifications::event::{names, Event};
use crate::notifications::pattern::EventPattern;
use crate::notifications::timeline::{Timeline, TimelineBuffer};
use crate::notifications::traits::{
    EventHandler, HandlerError, HandlerResult, SubscriberStatistics,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::ThreadId;

/// Default number of events kept in the timeline
pub const DEFAULT_RETENTION: usize = 1000;

/// Default bound on re-entrant emission of one event name
pub const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    pub retention: usize,
    pub max_depth: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Identifier of a single subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Returned by `subscribe`; pass to `unsubscribe` to revoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub owner: String,
    pub pattern: EventPattern,
}

/// Read-only view of a subscription for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub owner: String,
    pub pattern: EventPattern,
    pub delivered: u64,
    pub failed: u64,
}

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    owner: String,
    handler: Arc<dyn EventHandler>,
    statistics: SubscriberStatistics,
}

type SubscriptionTable = Arc<Vec<Arc<Subscription>>>;

pub struct EventBus {
    config: EventBusConfig,
    subscriptions: RwLock<SubscriptionTable>,
    next_id: AtomicU64,
    timeline: Mutex<TimelineBuffer>,
    depth: Mutex<HashMap<(ThreadId, String), usize>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("subscriptions", &self.snapshot().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        log::trace!(
            "EventBus: created (retention {}, max depth {})",
            config.retention,
            config.max_depth
        );
        Self {
            timeline: Mutex::new(TimelineBuffer::new(config.retention)),
            config,
            subscriptions: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
            depth: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Subscribe `handler` to events matching `pattern` on behalf of `owner`.
    pub fn subscribe<F>(
        &self,
        pattern: &str,
        owner: &str,
        handler: F,
    ) -> EventBusResult<SubscriptionHandle>
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = EventPattern::parse(pattern)?;
        Ok(self.subscribe_pattern(pattern, owner, Arc::new(handler)))
    }

    /// Subscribe with an already parsed pattern and shared handler.
    pub fn subscribe_pattern(
        &self,
        pattern: EventPattern,
        owner: &str,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            pattern: pattern.clone(),
            owner: owner.to_string(),
            handler,
            statistics: SubscriberStatistics::new(),
        });

        self.update_table(|table| table.push(subscription));
        log::debug!("EventBus: '{}' subscribed to '{}' ({})", owner, pattern, id);

        SubscriptionHandle {
            id,
            owner: owner.to_string(),
            pattern,
        }
    }

    /// Revoke one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut removed = false;
        self.update_table(|table| {
            let before = table.len();
            table.retain(|sub| sub.id != handle.id);
            removed = table.len() != before;
        });
        if removed {
            log::debug!("EventBus: revoked {} of '{}'", handle.id, handle.owner);
        }
        removed
    }

    /// Revoke every subscription held by `owner`. Returns how many were removed.
    pub fn unsubscribe_all(&self, owner: &str) -> usize {
        let mut removed = 0;
        self.update_table(|table| {
            let before = table.len();
            table.retain(|sub| sub.owner != owner);
            removed = before - table.len();
        });
        if removed > 0 {
            log::debug!("EventBus: revoked {} subscription(s) of '{}'", removed, owner);
        }
        removed
    }

    pub fn subscription_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Subscriptions in delivery order
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.snapshot()
            .iter()
            .map(|sub| SubscriptionInfo {
                id: sub.id,
                owner: sub.owner.clone(),
                pattern: sub.pattern.clone(),
                delivered: sub.statistics.delivered(),
                failed: sub.statistics.failed(),
            })
            .collect()
    }

    pub fn subscriptions_of(&self, owner: &str) -> Vec<SubscriptionInfo> {
        self.subscriptions()
            .into_iter()
            .filter(|info| info.owner == owner)
            .collect()
    }

    /// Publish an event to every matching handler.
    ///
    /// Handler failures are reported through `event.handler.error` and never
    /// stop delivery. Fails only when re-entrant emission of the same event
    /// name exceeds the configured depth.
    pub fn emit(&self, event: Event) -> EventBusResult<()> {
        let _depth = self.enter(&event.name)?;

        let event = Arc::new(event);
        lock(&self.timeline).push(Arc::clone(&event));

        let table = self.snapshot();
        let mut delivered = 0usize;
        for subscription in table.iter().filter(|sub| sub.pattern.matches(&event.name)) {
            delivered += 1;
            subscription.statistics.record_delivery();
            if let Err(error) = subscription.handler.handle(&event) {
                subscription.statistics.record_failure();
                self.report_handler_error(&event, subscription, error);
            }
        }

        log::trace!("EventBus: '{}' delivered to {} handler(s)", event.name, delivered);
        Ok(())
    }

    /// Convenience wrapper around [`EventBus::emit`]
    pub fn publish(&self, name: &str, payload: serde_json::Value) -> EventBusResult<()> {
        self.emit(Event::with_payload(name, payload))
    }

    /// Snapshot of the retained history
    pub fn timeline(&self) -> Timeline {
        lock(&self.timeline).snapshot()
    }

    pub fn clear_timeline(&self) {
        lock(&self.timeline).clear();
    }

    fn report_handler_error(&self, event: &Event, subscription: &Subscription, error: HandlerError) {
        let failure = EventBusError::HandlerError {
            event_name: event.name.clone(),
            owner: subscription.owner.clone(),
            cause: error.message().to_string(),
        };
        log::warn!("EventBus: {}", failure);

        // A failure while handling a handler-error report is only logged
        if event.name == names::HANDLER_ERROR {
            return;
        }

        let report = Event::with_payload(
            names::HANDLER_ERROR,
            json!({
                "event": event.name,
                "owner": subscription.owner,
                "subscription": subscription.id.to_string(),
                "error": error.message(),
            }),
        )
        .correlated_opt(event.correlation_id)
        .from_source("event-bus");

        if let Err(e) = self.emit(report) {
            log::debug!("EventBus: could not publish handler error report: {}", e);
        }
    }

    fn enter(&self, event_name: &str) -> EventBusResult<DepthGuard<'_>> {
        let key = (std::thread::current().id(), event_name.to_string());
        let mut depths = lock(&self.depth);
        let depth = depths.entry(key.clone()).or_insert(0);
        if *depth >= self.config.max_depth {
            let error = EventBusError::EventLoopDetected {
                event_name: event_name.to_string(),
                depth: *depth,
                limit: self.config.max_depth,
            };
            log::warn!("EventBus: {}", error);
            return Err(error);
        }
        *depth += 1;
        Ok(DepthGuard { bus: self, key })
    }

    fn snapshot(&self) -> SubscriptionTable {
        Arc::clone(
            &self
                .subscriptions
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn update_table(&self, update: impl FnOnce(&mut Vec<Arc<Subscription>>)) {
        let mut current = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = current.as_ref().clone();
        update(&mut next);
        *current = Arc::new(next);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the re-entrancy counter when an emission finishes
struct DepthGuard<'a> {
    bus: &'a EventBus,
    key: (ThreadId, String),
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let mut depths = lock(&self.bus.depth);
        if let Some(depth) = depths.get_mut(&self.key) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                depths.remove(&self.key);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
