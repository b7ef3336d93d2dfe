use std::time::Duration;

/// Server-level configuration for dispatching and ticket retention.
///
/// Controls invocation timeouts, concurrency limits, and the eviction worker.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier reported in logs and the health endpoint.
    pub node_id: String,
    /// Maximum run time of a single invocation in milliseconds. Exceeding it
    /// records an invocation failure.
    pub default_invocation_timeout_ms: u64,
    /// Maximum number of invocations executing at once. Further dispatches
    /// wait for a free slot rather than being rejected.
    pub max_concurrent_dispatches: u32,
    /// Interval between eviction sweeps in milliseconds.
    pub eviction_interval_ms: u64,
    /// Evict tickets this long after their outcome was first fetched.
    /// `None` keeps retrieved tickets forever.
    pub retrieved_ttl: Option<Duration>,
    /// Evict completed tickets this long after completion even if nobody
    /// fetched them. `None` keeps them forever.
    pub unclaimed_ttl: Option<Duration>,
    /// Reject submissions naming an unregistered operation with 400 instead
    /// of recording a resolution failure on the ticket.
    pub strict_resolution: bool,
}

impl ServerConfig {
    /// Whether any eviction policy is enabled.
    #[must_use]
    pub fn eviction_enabled(&self) -> bool {
        self.retrieved_ttl.is_some() || self.unclaimed_ttl.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            default_invocation_timeout_ms: 30_000,
            max_concurrent_dispatches: 64,
            eviction_interval_ms: 60_000,
            retrieved_ttl: None,
            unclaimed_ttl: None,
            strict_resolution: false,
        }
    }
}
