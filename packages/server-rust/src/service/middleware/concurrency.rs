//! Concurrency-limiting middleware for invocations.
//!
//! Caps the number of invocations running at once at
//! `max_concurrent_dispatches`. Unlike a load shedder, excess invocations
//! wait for a permit instead of failing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::debug;

use crate::service::operation::{Invocation, InvocationError};

// ---------------------------------------------------------------------------
// ConcurrencyLimitLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds concurrent invocations via a shared semaphore.
///
/// All services produced by one layer share the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimitLayer {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimitLayer {
    /// Creates a layer allowing `max_concurrent` invocations at once.
    /// A limit of 0 is raised to 1.
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1) as usize)),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Layer<S> for ConcurrencyLimitLayer {
    type Service = ConcurrencyLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConcurrencyLimitService {
            inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConcurrencyLimitService
// ---------------------------------------------------------------------------

/// Service wrapper that holds a semaphore permit for the whole invocation.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimitService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<Invocation> for ConcurrencyLimitService<S>
where
    S: Service<Invocation, Response = Value, Error = InvocationError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = InvocationError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let semaphore = self.semaphore.clone();
        // The inner service was polled ready; take it and leave a fresh clone
        // behind for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if semaphore.available_permits() == 0 {
                debug!(ticket_id = %invocation.ctx.ticket_id, "waiting for a dispatch slot");
            }
            let Ok(permit) = semaphore.acquire_owned().await else {
                return Err(InvocationError::Unavailable);
            };
            let result = inner.call(invocation).await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
