use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::signature::Signature;

/// A unit of code that can be invoked by name.
///
/// Implementations declare their parameter list up front; the dispatcher binds
/// arguments against it before `invoke` is called, so `args` always has
/// `signature().arity()` elements of the declared types.
#[async_trait]
pub trait Invocable: Send + Sync {
    /// Declared parameters, in positional order.
    fn signature(&self) -> &Signature;

    /// Runs the operation. An `Err` is recorded as an invocation failure.
    async fn invoke(&self, ctx: &InvocationContext, args: Vec<Value>) -> Result<Value, String>;
}

/// Maps an `(interface, operation)` name pair to invocable code.
pub trait CapabilityRegistry: Send + Sync {
    /// Returns `None` when the pair is not registered.
    fn resolve(&self, interface: &str, operation: &str) -> Option<Arc<dyn Invocable>>;
}
