//! Process shutdown coordination
//!
//! Turns OS signals into a [`CancellationSignal`] the host can hand to the
//! command pipeline. The first signal requests a graceful stop of the running
//! command; a second one exits immediately.

use crate::core::cancellation::CancellationSignal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Exit status used when a second signal forces an immediate exit
const FORCED_EXIT_CODE: i32 = 130;

/// Coordinates graceful shutdown across the application
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    signal: CancellationSignal,
    signal_count: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that fires when shutdown has been requested
    pub fn signal(&self) -> CancellationSignal {
        self.signal.clone()
    }

    pub fn trigger_shutdown(&self) {
        self.signal.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Install OS signal listeners. Must be called from within a tokio runtime.
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            // Restore default SIGPIPE so piping output into `head` does not panic
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            use tokio::signal::unix::{signal, SignalKind};
            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
            ] {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    if let Ok(mut stream) = signal(kind) {
                        while stream.recv().await.is_some() {
                            coordinator.on_signal();
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal();
                }
            });
        }
    }

    fn on_signal(&self) {
        let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
        if previous >= 1 {
            log::warn!("Second interrupt received; exiting");
            std::process::exit(FORCED_EXIT_CODE);
        }
        log::info!("Interrupt received; cancelling running command");
        self.trigger_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[test]
    fn test_shutdown_coordinator_creation() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_trigger_fires_handed_out_signal() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();

        coordinator.trigger_shutdown();

        assert!(coordinator.is_shutdown_requested());
        let fired = timeout(Duration::from_millis(100), signal.cancelled()).await;
        assert!(fired.is_ok(), "handed-out signal should observe shutdown");
    }

    #[tokio::test]
    async fn test_first_signal_requests_graceful_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.on_signal();
        assert!(coordinator.is_shutdown_requested());
    }
}
