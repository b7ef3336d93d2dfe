//! Timeout middleware for invocations.
//!
//! Fails invocations that exceed their `timeout_ms` with
//! `InvocationError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{Invocation, InvocationError};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-invocation timeout enforcement.
///
/// The timeout is read from each invocation's `timeout_ms` field.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Invocation> for TimeoutService<S>
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
        let timeout_ms = invocation.timeout_ms;
        let ticket_id = invocation.ctx.ticket_id;
        let fut = self.inner.call(invocation);
        Box::pin(async move {
            let duration = Duration::from_millis(timeout_ms);
            if let Ok(result) = tokio::time::timeout(duration, fut).await {
                result
            } else {
                warn!(%ticket_id, timeout_ms, "invocation timed out");
                Err(InvocationError::Timeout { timeout_ms })
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::middleware::test_support::{make_invocation, SlowService};

    #[tokio::test(start_paused = true)]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let value = svc.oneshot(make_invocation(3, 1000)).await.unwrap();
        assert_eq!(value, json!(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_invocation(3, 50)).await.unwrap_err();
        assert_eq!(err, InvocationError::Timeout { timeout_ms: 50 });
    }
}
