//! Network configuration types for the `AppBus` server.

use std::time::Duration;

/// Default mount point of the invocation endpoints.
pub const DEFAULT_BASE_PATH: &str = "/appbus/v1/appInvoker";

/// Mount point of the instance setup endpoints.
pub const SETUP_PATH: &str = "/appbus/v1/setup";

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Path prefix of the submit, poll and result endpoints.
    pub base_path: String,
    /// Scheme and authority prepended to `Location` headers, e.g.
    /// `https://bus.example.com`. `None` emits path-absolute locations.
    pub public_url: Option<String>,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// How long shutdown waits for running invocations.
    pub drain_timeout: Duration,
}

impl NetworkConfig {
    /// Base path without a trailing slash, starting with `/`. Empty when the
    /// endpoints are mounted at the root.
    #[must_use]
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim().trim_end_matches('/');
        if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Builds a `Location` header value for `path`.
    #[must_use]
    pub fn location(&self, path: &str) -> String {
        match &self.public_url {
            Some(url) => format!("{}{path}", url.trim_end_matches('/')),
            None => path.to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            base_path: DEFAULT_BASE_PATH.to_string(),
            public_url: None,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
        }
    }
}
