//! Public API for the event bus
//!
//! External modules should import from here rather than directly from internal modules.
//! The bus is an owned object: create one per host with [`EventBus::new`] and share it
//! through an `Arc`.

pub use crate::notifications::bus::{
    EventBus, EventBusConfig, SubscriptionHandle, SubscriptionId, SubscriptionInfo,
    DEFAULT_MAX_DEPTH, DEFAULT_RETENTION,
};
pub use crate::notifications::error::{EventBusError, EventBusResult};
pub use crate::notifications::event::{names, CorrelationId, Event};
pub use crate::notifications::pattern::{is_valid_event_name, EventPattern};
pub use crate::notifications::timeline::{Timeline, TimelineIter};
pub use crate::notifications::traits::{
    EventHandler, HandlerError, HandlerResult, SubscriberStatistics,
};
