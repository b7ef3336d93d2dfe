//! Invocation outcome counters.
//!
//! [`MetricsLayer`] classifies every result leaving the inner stack, bumps
//! the matching counter in a shared [`InvocationStats`] and emits one
//! `invocation complete` event inside an `invocation` span. The counters are
//! reported by `GET /health`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::service::operation::{Invocation, InvocationError};

/// How an invocation ended, as far as the pipeline can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationResult {
    Succeeded,
    Failed,
    TimedOut,
    Panicked,
}

impl InvocationResult {
    fn classify(result: &Result<Value, InvocationError>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(InvocationError::Timeout { .. }) => Self::TimedOut,
            Err(InvocationError::Panicked(_)) => Self::Panicked,
            Err(InvocationError::Failed(_) | InvocationError::Unavailable) => Self::Failed,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "ok",
            Self::Failed => "error",
            Self::TimedOut => "timeout",
            Self::Panicked => "panic",
        }
    }
}

/// Running totals shared by every clone of the pipeline.
#[derive(Debug, Default)]
pub struct InvocationStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of [`InvocationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvocationCounts {
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
}

impl InvocationCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out + self.panicked
    }
}

impl InvocationStats {
    pub fn record(&self, result: InvocationResult) {
        let counter = match result {
            InvocationResult::Succeeded => &self.succeeded,
            InvocationResult::Failed => &self.failed,
            InvocationResult::TimedOut => &self.timed_out,
            InvocationResult::Panicked => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> InvocationCounts {
        InvocationCounts {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer {
    stats: Arc<InvocationStats>,
}

impl MetricsLayer {
    #[must_use]
    pub fn new(stats: Arc<InvocationStats>) -> Self {
        Self { stats }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            stats: Arc::clone(&self.stats),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    stats: Arc<InvocationStats>,
}

impl<S> Service<Invocation> for MetricsService<S>
where
    S: Service<Invocation, Response = Value, Error = InvocationError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = InvocationError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let span = tracing::info_span!(
            "invocation",
            ticket_id = invocation.ctx.ticket_id.0,
            operation = %invocation.qualified_name(),
        );
        let stats = Arc::clone(&self.stats);
        let started = Instant::now();
        let fut = self.inner.call(invocation);

        Box::pin(
            async move {
                let result = fut.await;
                let classified = InvocationResult::classify(&result);
                stats.record(classified);

                #[allow(clippy::cast_possible_truncation)]
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    elapsed_ms,
                    result = classified.as_str(),
                    "invocation complete"
                );
                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
