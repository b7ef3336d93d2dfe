//! Client-side configuration: where the server lives and how to poll it.

use std::time::Duration;

/// Default mount point of the invocation endpoints on the server.
pub const DEFAULT_BASE_PATH: &str = "/appbus/v1/appInvoker";

/// Delay schedule between consecutive polls of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPolicy {
    /// Same delay before every poll after the first.
    Fixed(Duration),
    /// Starts at `initial`, doubles after each pending poll, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(5))
    }
}

impl PollPolicy {
    /// Delay to wait after the `attempt`-th pending poll (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

/// Settings for an [`InvocationClient`](crate::InvocationClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and authority of the server, e.g. `http://localhost:1337`.
    pub server_url: String,
    /// Path of the submit endpoint.
    pub base_path: String,
    pub poll_policy: PollPolicy,
    /// Upper bound on poll requests per invocation.
    pub max_polls: u32,
    /// Upper bound on total time spent polling, if any.
    pub max_wait: Option<Duration>,
    /// Per-request timeout applied to every HTTP call.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1337".to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            poll_policy: PollPolicy::default(),
            max_polls: 720,
            max_wait: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `server_url` with every other field defaulted.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}
