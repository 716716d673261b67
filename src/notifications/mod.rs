//! Event Bus
//!
//! Topic-based publish/subscribe with correlation identifiers and a bounded,
//! append-only timeline. Plugins and the command pipeline publish through it;
//! plugins subscribe to extend each other's behaviour.

// Internal modules - all access should go through api module
pub(crate) mod bus;
pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod pattern;
pub(crate) mod timeline;
pub(crate) mod traits;

// Public API module - the only public interface for the event bus
pub mod api;

#[cfg(test)]
mod tests;
