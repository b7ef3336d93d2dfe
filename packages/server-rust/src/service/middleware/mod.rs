//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`concurrency`]: Semaphore-based cap on concurrently running invocations
//! - [`timeout`]: Per-invocation timeout enforcement
//! - [`metrics`]: Outcome counters and an `invocation` tracing span
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod concurrency;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

#[cfg(test)]
pub(crate) mod test_support;

pub use concurrency::ConcurrencyLimitLayer;
pub use metrics::{InvocationCounts, InvocationStats, MetricsLayer};
pub use pipeline::{build_invocation_pipeline, InvocationPipeline};
pub use timeout::TimeoutLayer;
