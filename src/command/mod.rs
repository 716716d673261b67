//! Command Pipeline
//!
//! Resolves a parsed command line against the merged command map of all
//! active plugins and runs it through pre-hooks, the command body and
//! post-hooks under a deadline, producing a structured result.

// Internal modules - all access should go through api module
pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod pipeline;
pub(crate) mod schema;
pub(crate) mod table;
pub(crate) mod traits;
pub(crate) mod types;

// Public API module - the only public interface for the command pipeline
pub mod api;

#[cfg(test)]
mod tests;
