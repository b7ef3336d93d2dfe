//! Validated invocation requests and their addressing modes.
//!
//! A raw [`SubmissionBody`] is turned into an [`InvocationRequest`] exactly
//! once, at the submission boundary. Anything that cannot name a single target
//! is rejected with a [`RequestError`] before a ticket exists.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::messages::{InvocationInformation, SubmissionBody};

/// Identifier of a node or service instance.
///
/// Callers send these either as JSON numbers or strings; both are accepted
/// and echoed back in the form they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceRef {
    Number(u64),
    Text(String),
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for InstanceRef {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for InstanceRef {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// The instance an operation is invoked on. Exactly one addressing mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvocationTarget {
    /// Direct reference to a node instance.
    NodeInstance { node_instance_id: InstanceRef },
    /// A node template inside a service instance.
    ServiceInstance {
        service_instance_id: InstanceRef,
        node_template_id: String,
    },
}

impl fmt::Display for InvocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeInstance { node_instance_id } => write!(f, "node-instance/{node_instance_id}"),
            Self::ServiceInstance {
                service_instance_id,
                node_template_id,
            } => write!(f, "service-instance/{service_instance_id}/{node_template_id}"),
        }
    }
}

/// Reasons a submission is rejected before any ticket is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("missing `invocation-information`")]
    MissingInvocationInformation,
    #[error("missing or empty `interface`")]
    MissingInterface,
    #[error("missing or empty `operation`")]
    MissingOperation,
    #[error("no target: expected `nodeInstanceID` or `serviceInstanceID` + `nodeTemplateID`")]
    MissingTarget,
    #[error("ambiguous target: `nodeInstanceID` cannot be combined with `serviceInstanceID`/`nodeTemplateID`")]
    AmbiguousTarget,
    #[error("service target requires both `serviceInstanceID` and `nodeTemplateID`")]
    IncompleteServiceTarget,
    #[error("`params` must be a JSON object")]
    ParamsNotObject,
}

/// A fully validated invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub interface: String,
    pub operation: String,
    pub target: InvocationTarget,
    /// Named parameters in submission order. Only the order is significant
    /// for binding; names are kept for diagnostics.
    pub params: Map<String, Value>,
}

impl InvocationRequest {
    #[must_use]
    pub fn new(
        interface: impl Into<String>,
        operation: impl Into<String>,
        target: InvocationTarget,
    ) -> Self {
        Self {
            interface: interface.into(),
            operation: operation.into(),
            target,
            params: Map::new(),
        }
    }

    /// Appends a named parameter; position is the insertion order.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Parses and validates a raw JSON submission body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidBody`] for unparseable JSON and any other
    /// [`RequestError`] variant for structurally invalid submissions.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RequestError> {
        let body: SubmissionBody =
            serde_json::from_slice(bytes).map_err(|e| RequestError::InvalidBody(e.to_string()))?;
        Self::try_from(body)
    }

    /// Positional argument list, in parameter order.
    #[must_use]
    pub fn arguments(&self) -> Vec<Value> {
        self.params.values().cloned().collect()
    }

    /// Qualified `interface.operation` name used in logs.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.interface, self.operation)
    }

    /// Builds the wire body for this request.
    #[must_use]
    pub fn to_body(&self) -> SubmissionBody {
        let mut info = InvocationInformation {
            interface: Some(self.interface.clone()),
            operation: Some(self.operation.clone()),
            ..InvocationInformation::default()
        };
        match &self.target {
            InvocationTarget::NodeInstance { node_instance_id } => {
                info.node_instance_id = Some(node_instance_id.clone());
            }
            InvocationTarget::ServiceInstance {
                service_instance_id,
                node_template_id,
            } => {
                info.service_instance_id = Some(service_instance_id.clone());
                info.node_template_id = Some(node_template_id.clone());
            }
        }
        SubmissionBody {
            invocation_information: Some(info),
            params: Some(Value::Object(self.params.clone())),
        }
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

/// Blank text ids count as absent, like blank names.
fn present_ref(field: Option<InstanceRef>) -> Option<InstanceRef> {
    field.filter(|r| !matches!(r, InstanceRef::Text(s) if s.trim().is_empty()))
}

fn resolve_target(info: &InvocationInformation) -> Result<InvocationTarget, RequestError> {
    let node = present_ref(info.node_instance_id.clone());
    let service = present_ref(info.service_instance_id.clone());
    let template = non_empty(info.node_template_id.clone());
    let service_mode = service.is_some() || template.is_some();

    match (node, service_mode) {
        (Some(_), true) => Err(RequestError::AmbiguousTarget),
        (Some(node_instance_id), false) => Ok(InvocationTarget::NodeInstance { node_instance_id }),
        (None, false) => Err(RequestError::MissingTarget),
        (None, true) => match (service, template) {
            (Some(service_instance_id), Some(node_template_id)) => {
                Ok(InvocationTarget::ServiceInstance {
                    service_instance_id,
                    node_template_id,
                })
            }
            _ => Err(RequestError::IncompleteServiceTarget),
        },
    }
}

impl TryFrom<SubmissionBody> for InvocationRequest {
    type Error = RequestError;

    fn try_from(body: SubmissionBody) -> Result<Self, Self::Error> {
        let info = body
            .invocation_information
            .ok_or(RequestError::MissingInvocationInformation)?;
        let target = resolve_target(&info)?;
        let interface = non_empty(info.interface).ok_or(RequestError::MissingInterface)?;
        let operation = non_empty(info.operation).ok_or(RequestError::MissingOperation)?;

        let params = match body.params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(RequestError::ParamsNotObject),
        };

        Ok(Self {
            interface,
            operation,
            target,
            params,
        })
    }
}
