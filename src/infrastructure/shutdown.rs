//! Shutdown coordination
//!
//! One flag, observed by the reconcile loop, the pod event listener and
//! every connection attempt, plus a count of attempts still in flight so
//! the process can let them settle before exiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Cloneable handle to the process-wide stop flag.
#[derive(Clone)]
pub struct ShutdownController {
    stopping: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            stopping: Arc::new(stopping),
            in_flight: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Raise the stop flag. Later calls are no-ops.
    pub fn shutdown(&self) {
        if !self.stopping.send_replace(true) {
            tracing::info!("initiating graceful shutdown");
            if self.in_flight() == 0 {
                self.drained.notify_one();
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Resolve once the stop flag is raised, immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.stopping.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    /// Connection attempts currently holding a guard.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count one connection attempt until the guard is dropped.
    pub fn probe_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            controller: self.clone(),
        }
    }

    /// Wait up to `timeout` for every guard to drop. `false` on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let settled = async {
            while self.in_flight() > 0 {
                self.drained.notified().await;
            }
        };

        match tokio::time::timeout(timeout, settled).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!("drain timeout: {} connections still open", self.in_flight());
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop.
pub struct InFlightGuard {
    controller: ShutdownController,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let before = self.controller.in_flight.fetch_sub(1, Ordering::SeqCst);
        if before == 1 {
            self.controller.drained.notify_one();
        }
    }
}

/// Raise the stop flag on Ctrl+C or SIGTERM.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // a failed Ctrl+C registration disables that branch
    let reason = tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => "Ctrl+C",
        () = terminate => "SIGTERM",
    };

    tracing::info!("received {}", reason);
    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutdown());
        assert!(controller.clone().is_shutdown());
    }

    #[test]
    fn test_guards_count_in_flight() {
        let controller = ShutdownController::new();

        let first = controller.probe_guard();
        {
            let _second = controller.probe_guard();
            assert_eq!(controller.in_flight(), 2);
        }
        assert_eq!(controller.in_flight(), 1);

        drop(first);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_after_shutdown_returns_immediately() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_every_waiter() {
        let controller = ShutdownController::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let waiter = controller.clone();
                tokio::spawn(async move { waiter.cancelled().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.shutdown();

        for waiter in waiters {
            let result = tokio::time::timeout(Duration::from_millis(200), waiter).await;
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cancelled_pending_without_shutdown() {
        let controller = ShutdownController::new();
        let result = tokio::time::timeout(Duration::from_millis(30), controller.cancelled()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_drain_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();
        assert!(controller.wait_for_drain(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_after_guard_drops() {
        let controller = ShutdownController::new();
        let guard = controller.probe_guard();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(200)).await);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_drain_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.probe_guard();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }
}
