//! Types flowing through the dispatch pipeline.

use std::sync::Arc;

use appbus_core::{Failure, Invocable, InvocationContext, RequestError};
use serde_json::Value;

/// One resolved and bound invocation, ready to run.
#[derive(Clone)]
pub struct Invocation {
    pub ctx: InvocationContext,
    pub invocable: Arc<dyn Invocable>,
    /// Arguments already bound against the invocable's signature.
    pub args: Vec<Value>,
    pub timeout_ms: u64,
}

impl Invocation {
    /// Qualified `interface.operation` name used in logs.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.ctx.interface, self.ctx.operation)
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("ctx", &self.ctx)
            .field("args", &self.args)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Errors produced while running an invocation. All of them end up stored
/// on the ticket as an invocation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("{0}")]
    Failed(String),
    #[error("invocation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("invocation panicked: {0}")]
    Panicked(String),
    #[error("dispatcher is shutting down")]
    Unavailable,
}

impl From<InvocationError> for Failure {
    fn from(err: InvocationError) -> Self {
        Failure::invocation(err.to_string())
    }
}

/// Reasons a submission is refused before any ticket is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Malformed(#[from] RequestError),
    #[error("no operation `{interface}.{operation}` is registered")]
    Unresolvable { interface: String, operation: String },
}
