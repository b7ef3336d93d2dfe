use appbus_core::Failure;

/// Errors surfaced by [`InvocationClient`](crate::InvocationClient).
///
/// `SubmissionRejected` and `Transport` mean the server never accepted the
/// invocation. `Invocation` means it was accepted, ran, and failed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The submit endpoint answered with something other than `202 Accepted`.
    #[error("submission rejected ({status}): {body}")]
    SubmissionRejected { status: u16, body: String },

    /// The ticket did not become ready within the configured bounds.
    #[error("ticket {ticket} not ready after {polls} poll(s)")]
    PollTimeout { ticket: String, polls: u32 },

    /// The caller cancelled the invocation while it was in progress.
    #[error("invocation cancelled")]
    Cancelled,

    /// The configured server URL or a `Location` header is not a valid URL.
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP request itself failed (connect, DNS, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered in a way the polling protocol does not allow.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The operation ran and recorded a failure outcome.
    #[error("{}: {}", .0.kind, .0.message)]
    Invocation(Failure),
}

impl ClientError {
    /// True when the server accepted the invocation and it failed.
    #[must_use]
    pub fn is_invocation_failure(&self) -> bool {
        matches!(self, Self::Invocation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_failure_displays_kind_and_message() {
        let err = ClientError::Invocation(Failure::resolution("no operation `X.y` is registered"));
        assert_eq!(
            err.to_string(),
            "ResolutionFailure: no operation `X.y` is registered"
        );
        assert!(err.is_invocation_failure());
    }

    #[test]
    fn rejection_is_not_an_invocation_failure() {
        let err = ClientError::SubmissionRejected {
            status: 400,
            body: "{}".to_string(),
        };
        assert!(!err.is_invocation_failure());
        assert_eq!(err.to_string(), "submission rejected (400): {}");
    }
}
