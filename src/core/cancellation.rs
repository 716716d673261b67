//! Cooperative cancellation
//!
//! A [`CancellationSignal`] is shared between the pipeline and a command body
//! running on a worker task. The pipeline signals; the body polls
//! [`CancellationSignal::is_cancelled`] or awaits [`CancellationSignal::cancelled`].
//! Nothing is ever force-killed.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cloneable cancellation flag with async notification
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
