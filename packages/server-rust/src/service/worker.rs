//! Periodic background work.
//!
//! [`BackgroundWorker`] owns a [`PeriodicTask`] on its own tokio task and
//! calls it on a fixed interval until stopped. The server runs one worker,
//! the [`EvictionSweeper`], and only when a ticket TTL is configured.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::ServerConfig;
use crate::storage::TicketStore;

// ---------------------------------------------------------------------------
// PeriodicTask
// ---------------------------------------------------------------------------

/// Work run by a [`BackgroundWorker`] once per interval.
#[async_trait]
pub trait PeriodicTask: Send + 'static {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    async fn tick(&mut self);

    /// Called once after the last tick.
    async fn finish(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a running [`PeriodicTask`].
///
/// The first tick fires one full interval after `start`. Ticks that fall
/// behind are skipped rather than bunched up.
pub struct BackgroundWorker<T: PeriodicTask> {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<T>,
}

impl<T: PeriodicTask> BackgroundWorker<T> {
    /// Spawns the worker. Must be called within a tokio runtime; a zero
    /// interval is treated as 1ms.
    pub fn start(mut task: T, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(task = task.name(), ?interval, "background worker started");

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => task.tick().await,
                }
            }

            task.finish().await;
            debug!(task = task.name(), "background worker stopped");
            task
        });

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Stops after the tick in progress (if any) and hands the task back.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked.
    pub async fn stop(mut self) -> anyhow::Result<T> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.handle.await.map_err(|e| {
            warn!(error = %e, "background worker ended abnormally");
            anyhow::anyhow!("background worker failed: {e}")
        })
    }
}

// ---------------------------------------------------------------------------
// EvictionSweeper
// ---------------------------------------------------------------------------

/// Removes tickets from the store once their TTL has passed.
///
/// - `retrieved_ttl`: measured from the first fetch
/// - `unclaimed_ttl`: measured from completion, whether fetched or not
///
/// Pending tickets are never touched.
pub struct EvictionSweeper {
    store: Arc<TicketStore>,
    retrieved_ttl: Option<Duration>,
    unclaimed_ttl: Option<Duration>,
    evicted_total: u64,
}

impl EvictionSweeper {
    #[must_use]
    pub fn new(store: Arc<TicketStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            retrieved_ttl: config.retrieved_ttl,
            unclaimed_ttl: config.unclaimed_ttl,
            evicted_total: 0,
        }
    }

    /// Tickets removed since this sweeper was created.
    #[must_use]
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    /// Runs one pass and returns the number of tickets removed.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let retrieved = self
            .retrieved_ttl
            .map_or(0, |ttl| self.store.evict_retrieved(ttl, now));
        let unclaimed = self
            .unclaimed_ttl
            .map_or(0, |ttl| self.store.evict_completed(ttl, now));

        let removed = retrieved + unclaimed;
        if removed > 0 {
            self.evicted_total += removed as u64;
            info!(
                retrieved,
                unclaimed,
                total = self.evicted_total,
                remaining = self.store.len(),
                "evicted tickets"
            );
        }
        removed
    }
}

#[async_trait]
impl PeriodicTask for EvictionSweeper {
    fn name(&self) -> &'static str {
        "ticket-eviction"
    }

    async fn tick(&mut self) {
        self.sweep();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use appbus_core::{Outcome, TicketId, TicketStatus};
    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: u32,
        finished: bool,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn tick(&mut self) {
            self.ticks += 1;
        }

        async fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn completed_store(n: usize) -> Arc<TicketStore> {
        let store = Arc::new(TicketStore::new());
        for _ in 0..n {
            let id = store.create();
            store.complete(id, Outcome::Success(Value::Null)).unwrap();
        }
        store
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval_after_the_first_interval() {
        let worker = BackgroundWorker::start(Counter::default(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let counter = worker.stop().await.unwrap();
        assert_eq!(counter.ticks, 3);
        assert!(counter.finished);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick_still_finishes() {
        let worker = BackgroundWorker::start(Counter::default(), Duration::from_secs(60));
        let counter = worker.stop().await.unwrap();
        assert_eq!(counter.ticks, 0);
        assert!(counter.finished);
    }

    #[test]
    fn sweep_without_ttls_keeps_everything() {
        let store = completed_store(3);
        let mut sweeper = EvictionSweeper::new(Arc::clone(&store), &ServerConfig::default());
        assert_eq!(sweeper.sweep(), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn sweep_evicts_retrieved_then_unclaimed() {
        let store = completed_store(3);
        store.fetch(TicketId(1)).unwrap();
        let pending = store.create();

        let config = ServerConfig {
            retrieved_ttl: Some(Duration::ZERO),
            ..ServerConfig::default()
        };
        let mut sweeper = EvictionSweeper::new(Arc::clone(&store), &config);
        assert_eq!(sweeper.sweep(), 1);
        assert_eq!(store.status(TicketId(1)), None);
        assert_eq!(store.len(), 3);

        sweeper.unclaimed_ttl = Some(Duration::ZERO);
        assert_eq!(sweeper.sweep(), 2);
        assert_eq!(store.status(pending), Some(TicketStatus::Pending));
        assert_eq!(sweeper.evicted_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_worker_sweeps_on_its_interval() {
        let store = completed_store(2);
        let config = ServerConfig {
            unclaimed_ttl: Some(Duration::ZERO),
            ..ServerConfig::default()
        };
        let worker = BackgroundWorker::start(
            EvictionSweeper::new(Arc::clone(&store), &config),
            Duration::from_millis(config.eviction_interval_ms),
        );

        assert_eq!(store.len(), 2);
        tokio::time::sleep(Duration::from_millis(config.eviction_interval_ms + 1)).await;
        assert!(store.is_empty());

        let sweeper = worker.stop().await.unwrap();
        assert_eq!(sweeper.evicted_total(), 2);
    }
}
