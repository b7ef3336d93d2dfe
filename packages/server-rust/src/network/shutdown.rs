//! Serving state and dispatch draining.
//!
//! The health state moves `Starting -> Ready -> Draining -> Stopped` and is
//! read lock-free on every submission and probe. Each issued ticket holds a
//! [`DispatchGuard`] until its outcome is stored, so shutdown can wait for
//! exactly the invocations that still owe a result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;

/// Serving state reported by the health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Listener bound, not yet serving.
    Starting,
    /// Accepting submissions.
    Ready,
    /// Submissions are refused; issued tickets still run to completion and
    /// can be polled and fetched.
    Draining,
    /// Every issued ticket has its outcome recorded.
    Stopped,
}

impl HealthState {
    /// Lower-case label reported by the health endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Count of dispatches without a stored outcome, plus a wakeup for the
/// moment it reaches zero.
#[derive(Debug, Default)]
struct DispatchTracker {
    running: AtomicU64,
    idle: Notify,
}

impl DispatchTracker {
    async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.idle.notified());
            // Register before checking so a concurrent last drop is not missed.
            notified.as_mut().enable();
            if self.running.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Shared serving state of one server instance.
///
/// - probes read [`ShutdownController::health_state`]
/// - the submit handler checks [`ShutdownController::is_accepting`]
/// - the dispatcher holds a [`DispatchGuard`] per issued ticket
/// - `serve` calls [`ShutdownController::trigger_shutdown`] and then
///   [`ShutdownController::wait_for_drain`]
#[derive(Debug)]
pub struct ShutdownController {
    state: ArcSwap<HealthState>,
    dispatches: Arc<DispatchTracker>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(HealthState::Starting),
            dispatches: Arc::new(DispatchTracker::default()),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    /// Stops accepting submissions. Idempotent.
    pub fn trigger_shutdown(&self) {
        if self.health_state() != HealthState::Stopped {
            self.state.store(Arc::new(HealthState::Draining));
        }
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    /// Whether a new submission may be issued a ticket.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.health_state() == HealthState::Ready
    }

    /// Marks one dispatch as running until the returned guard is dropped.
    #[must_use]
    pub fn begin_dispatch(&self) -> DispatchGuard {
        self.dispatches.running.fetch_add(1, Ordering::AcqRel);
        DispatchGuard {
            dispatches: Arc::clone(&self.dispatches),
        }
    }

    /// Dispatches whose outcome is not stored yet.
    #[must_use]
    pub fn running_dispatches(&self) -> u64 {
        self.dispatches.running.load(Ordering::Acquire)
    }

    /// Waits until no dispatch is running, at most `timeout`.
    ///
    /// On success the state becomes `Stopped` and `true` is returned. On
    /// timeout the state is left unchanged.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.dispatches.wait_idle())
            .await
            .is_ok();
        if drained {
            self.state.store(Arc::new(HealthState::Stopped));
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by a dispatch task from ticket creation until its outcome is stored.
/// Released on unwind as well.
#[derive(Debug)]
pub struct DispatchGuard {
    dispatches: Arc<DispatchTracker>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if self.dispatches.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.dispatches.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_gates_submissions() {
        let controller = ShutdownController::new();
        assert_eq!(controller.health_state(), HealthState::Starting);
        assert!(!controller.is_accepting());

        controller.set_ready();
        assert!(controller.is_accepting());

        controller.trigger_shutdown();
        assert_eq!(controller.health_state(), HealthState::Draining);
        assert!(!controller.is_accepting());
    }

    #[test]
    fn health_state_labels() {
        assert_eq!(HealthState::Starting.as_str(), "starting");
        assert_eq!(HealthState::Ready.as_str(), "ready");
        assert_eq!(HealthState::Draining.as_str(), "draining");
        assert_eq!(HealthState::Stopped.as_str(), "stopped");
    }

    #[test]
    fn guards_count_running_dispatches() {
        let controller = ShutdownController::new();
        let first = controller.begin_dispatch();
        let second = controller.begin_dispatch();
        assert_eq!(controller.running_dispatches(), 2);

        drop(first);
        assert_eq!(controller.running_dispatches(), 1);
        drop(second);
        assert_eq!(controller.running_dispatches(), 0);
    }

    #[test]
    fn guard_released_on_panic() {
        let controller = Arc::new(ShutdownController::new());
        let inner = Arc::clone(&controller);
        let result = std::thread::spawn(move || {
            let _guard = inner.begin_dispatch();
            panic!("dispatch blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(controller.running_dispatches(), 0);
    }

    #[tokio::test]
    async fn drain_with_nothing_running_stops_at_once() {
        let controller = ShutdownController::new();
        controller.set_ready();
        controller.trigger_shutdown();

        assert!(controller.wait_for_drain(Duration::from_secs(1)).await);
        assert_eq!(controller.health_state(), HealthState::Stopped);

        // A late trigger does not resurrect Draining.
        controller.trigger_shutdown();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_wakes_when_last_dispatch_finishes() {
        let controller = ShutdownController::new();
        let guard = controller.begin_dispatch();
        controller.trigger_shutdown();

        let finisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_secs(5)).await);
        assert_eq!(controller.health_state(), HealthState::Stopped);
        finisher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drain_timeout_keeps_draining_state() {
        let controller = ShutdownController::new();
        let _guard = controller.begin_dispatch();
        controller.trigger_shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
        assert_eq!(controller.health_state(), HealthState::Draining);
        assert_eq!(controller.running_dispatches(), 1);
    }
}
