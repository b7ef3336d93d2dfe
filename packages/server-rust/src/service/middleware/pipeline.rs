//! Pipeline composition: combines all middleware layers into a single service stack.

use std::sync::Arc;

use serde_json::Value;
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::concurrency::ConcurrencyLimitLayer;
use super::metrics::{InvocationStats, MetricsLayer};
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::invoker::InvokeService;
use crate::service::operation::{Invocation, InvocationError};

/// Type-erased, cloneable dispatch pipeline. Each dispatch task owns a clone;
/// the `Sync` bound lets it live in axum state.
pub type InvocationPipeline = BoxCloneSyncService<Invocation, Value, InvocationError>;

/// Build the invocation pipeline by wrapping [`InvokeService`] with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `ConcurrencyLimitLayer` -- wait for a dispatch slot
/// 2. `MetricsLayer` -- count outcomes into `stats`, timeouts included
/// 3. `TimeoutLayer` -- enforce the per-invocation timeout (excludes queueing time)
#[must_use]
pub fn build_invocation_pipeline(
    config: &ServerConfig,
    stats: Arc<InvocationStats>,
) -> InvocationPipeline {
    let svc = ServiceBuilder::new()
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_dispatches))
        .layer(MetricsLayer::new(stats))
        .layer(TimeoutLayer)
        .service(InvokeService);
    BoxCloneSyncService::new(svc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use appbus_core::Signature;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::middleware::test_support::make_invocation;
    use crate::service::registry::{AsyncFnOperation, FnOperation};

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let svc = build_invocation_pipeline(&ServerConfig::default(), Arc::default());

        let mut invocation = make_invocation(42, 5000);
        invocation.invocable = Arc::new(FnOperation::new(Signature::empty(), |_| Ok(json!("hi"))));
        let value = svc.oneshot(invocation).await.unwrap();
        assert_eq!(value, json!("hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_times_out_slow_operations() {
        let svc = build_invocation_pipeline(&ServerConfig::default(), Arc::default());

        let mut invocation = make_invocation(1, 50);
        invocation.invocable = Arc::new(AsyncFnOperation::new(Signature::empty(), |_| async {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            Ok(Value::Null)
        }));
        let err = svc.oneshot(invocation).await.unwrap_err();
        assert_eq!(err, InvocationError::Timeout { timeout_ms: 50 });
    }
}
