use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned handle for one submitted invocation.
///
/// Ids start at 1, strictly increase in issue order, and are never reused
/// within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a ticket as tracked by the server.
///
/// `Pending -> Ready` is the only transition; a ticket never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// The dispatched operation has not returned yet.
    Pending,
    /// An outcome has been recorded and can be fetched.
    Ready,
}

impl TicketStatus {
    /// Returns the wire label used in poll responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
        }
    }
}

/// Classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The interface/operation pair is not known to the capability registry.
    ResolutionFailure,
    /// The operation was found but binding its arguments or running it failed.
    InvocationFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolutionFailure => f.write_str("ResolutionFailure"),
            Self::InvocationFailure => f.write_str("InvocationFailure"),
        }
    }
}

/// Structured description of a failed invocation, stored as ticket content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    #[must_use]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ResolutionFailure,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invocation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvocationFailure,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

/// The stored result of a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation returned a value. Operations without a return value
    /// produce `Value::Null`.
    Success(Value),
    /// The operation could not be resolved, bound, or executed.
    Failure(Failure),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts the outcome into a `Result`, the shape callers usually want.
    ///
    /// # Errors
    ///
    /// Returns the stored [`Failure`] when the outcome is not a success.
    pub fn into_result(self) -> Result<Value, Failure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl From<Result<Value, Failure>> for Outcome {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(failure) => Self::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ticket_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_value(TicketId(7)).unwrap(), json!(7));
        assert_eq!(TicketId(7).to_string(), "7");
    }

    #[test]
    fn ticket_status_wire_labels() {
        assert_eq!(serde_json::to_value(TicketStatus::Pending).unwrap(), json!("PENDING"));
        assert_eq!(TicketStatus::Ready.as_str(), "READY");
    }

    #[test]
    fn failure_kind_serializes_with_taxonomy_names() {
        let failure = Failure::resolution("no such operation");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["kind"], "ResolutionFailure");
        assert_eq!(value["message"], "no such operation");
    }

    #[test]
    fn outcome_into_result() {
        assert_eq!(Outcome::Success(json!(1)).into_result().unwrap(), json!(1));
        let err = Outcome::Failure(Failure::invocation("boom"))
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvocationFailure);
        assert_eq!(err.to_string(), "InvocationFailure: boom");
    }
}
