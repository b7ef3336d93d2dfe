//! JSON bodies exchanged between the invocation client and server.
//!
//! Field names follow the established wire format (`invocation-information`,
//! `nodeInstanceID`, ...) so that existing callers keep working.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::invocation::InstanceRef;
use crate::types::{Failure, Outcome, TicketId, TicketStatus};

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Addressing block of a submission body.
///
/// Every field is optional on the wire; [`InvocationRequest`](crate::InvocationRequest)
/// validation decides which combinations are acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationInformation {
    /// Interface (or class) that owns the operation.
    #[serde(default, alias = "class", skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Operation to invoke on the interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(rename = "nodeInstanceID", default, skip_serializing_if = "Option::is_none")]
    pub node_instance_id: Option<InstanceRef>,
    #[serde(rename = "serviceInstanceID", default, skip_serializing_if = "Option::is_none")]
    pub service_instance_id: Option<InstanceRef>,
    #[serde(rename = "nodeTemplateID", default, skip_serializing_if = "Option::is_none")]
    pub node_template_id: Option<String>,
}

/// Body of `POST <base>`.
///
/// `params` is kept as a raw JSON value: it must be an object whose entries,
/// in document order, become the positional argument list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionBody {
    #[serde(rename = "invocation-information", default, skip_serializing_if = "Option::is_none")]
    pub invocation_information: Option<InvocationInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Body of the `202 Accepted` submission response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub ticket_id: TicketId,
}

// ---------------------------------------------------------------------------
// Polling and retrieval
// ---------------------------------------------------------------------------

/// Body of a `200 OK` poll response for a ticket that is not ready yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStatusBody {
    pub status: TicketStatus,
}

impl PollStatusBody {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: TicketStatus::Pending,
        }
    }
}

/// Body of the result endpoint. Both outcomes sit under `result`:
///
/// - success: `{"result": <value>}`
/// - failure: `{"result": {"kind": ..., "message": ...}, "failed": true}`
///
/// Only the `failed` marker tells them apart, so a success value shaped
/// like a failure descriptor is still a success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEnvelope {
    Failure { result: Failure, failed: FailedMarker },
    Success { result: Value },
}

/// The `"failed": true` field of a failure envelope. Serializes as `true`
/// and refuses to deserialize from anything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailedMarker;

impl Serialize for FailedMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for FailedMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(Self)
        } else {
            Err(D::Error::custom("`failed` is only ever `true`"))
        }
    }
}

impl From<Outcome> for ResultEnvelope {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(result) => Self::Success { result },
            Outcome::Failure(result) => Self::Failure {
                result,
                failed: FailedMarker,
            },
        }
    }
}

impl From<&Outcome> for ResultEnvelope {
    fn from(outcome: &Outcome) -> Self {
        outcome.clone().into()
    }
}

impl From<ResultEnvelope> for Outcome {
    fn from(envelope: ResultEnvelope) -> Self {
        match envelope {
            ResultEnvelope::Success { result } => Self::Success(result),
            ResultEnvelope::Failure { result, .. } => Self::Failure(result),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Inner part of [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code, e.g. `MALFORMED_REQUEST`.
    pub code: String,
    pub message: String,
}

/// JSON body of every transport-level error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::FailureKind;

    #[test]
    fn submission_body_parses_node_instance_form() {
        let body: SubmissionBody = serde_json::from_value(json!({
            "invocation-information": {
                "interface": "Test",
                "operation": "helloWorld",
                "nodeInstanceID": 1
            },
            "params": {"name": "Michael"}
        }))
        .unwrap();

        let info = body.invocation_information.unwrap();
        assert_eq!(info.interface.as_deref(), Some("Test"));
        assert_eq!(info.node_instance_id, Some(InstanceRef::Number(1)));
        assert!(info.service_instance_id.is_none());
        assert_eq!(body.params, Some(json!({"name": "Michael"})));
    }

    #[test]
    fn class_is_accepted_as_interface_alias() {
        let info: InvocationInformation =
            serde_json::from_value(json!({"class": "Calc", "operation": "add"})).unwrap();
        assert_eq!(info.interface.as_deref(), Some("Calc"));
    }

    #[test]
    fn submission_body_omits_absent_fields() {
        let body = SubmissionBody {
            invocation_information: Some(InvocationInformation {
                interface: Some("Test".to_string()),
                operation: Some("echo".to_string()),
                service_instance_id: Some(InstanceRef::Number(5)),
                node_template_id: Some("web".to_string()),
                ..InvocationInformation::default()
            }),
            params: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "invocation-information": {
                    "interface": "Test",
                    "operation": "echo",
                    "serviceInstanceID": 5,
                    "nodeTemplateID": "web"
                }
            })
        );
    }

    #[test]
    fn poll_status_body_is_pending_marker() {
        let value = serde_json::to_value(PollStatusBody::pending()).unwrap();
        assert_eq!(value, json!({"status": "PENDING"}));
    }

    #[test]
    fn result_envelope_wire_shapes() {
        let ok = ResultEnvelope::from(Outcome::Success(json!("Hello Michael")));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"result": "Hello Michael"}));

        let failed = ResultEnvelope::from(Outcome::Failure(Failure::resolution("unknown")));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "result": {"kind": "ResolutionFailure", "message": "unknown"},
                "failed": true
            })
        );
    }

    #[test]
    fn result_envelope_parses_null_and_object_results() {
        let null: ResultEnvelope = serde_json::from_value(json!({"result": null})).unwrap();
        assert_eq!(Outcome::from(null), Outcome::Success(serde_json::Value::Null));

        // A value shaped like a failure descriptor is a success without the marker.
        let lookalike = json!({"kind": "InvocationFailure", "message": "y"});
        let object: ResultEnvelope =
            serde_json::from_value(json!({"result": lookalike.clone()})).unwrap();
        assert_eq!(Outcome::from(object), Outcome::Success(lookalike.clone()));

        let unmarked: ResultEnvelope =
            serde_json::from_value(json!({"result": lookalike, "failed": false})).unwrap();
        assert!(Outcome::from(unmarked).is_success());

        let failure: ResultEnvelope = serde_json::from_value(json!({
            "result": {"kind": "InvocationFailure", "message": "bad"},
            "failed": true
        }))
        .unwrap();
        match Outcome::from(failure) {
            Outcome::Failure(f) => assert_eq!(f.kind, FailureKind::InvocationFailure),
            Outcome::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn receipt_uses_camel_case() {
        let value = serde_json::to_value(SubmissionReceipt {
            ticket_id: TicketId(3),
        })
        .unwrap();
        assert_eq!(value, json!({"ticketId": 3}));
    }
}
