use std::future::Future;
use std::sync::Arc;

use appbus_core::{CapabilityRegistry, Invocable, InvocationContext, Signature};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

// ---------------------------------------------------------------------------
// Closure-backed invocables
// ---------------------------------------------------------------------------

/// Invocable backed by a synchronous closure over the bound arguments.
pub struct FnOperation<F> {
    signature: Signature,
    f: F,
}

impl<F> FnOperation<F>
where
    F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

#[async_trait]
impl<F> Invocable for FnOperation<F>
where
    F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, _ctx: &InvocationContext, args: Vec<Value>) -> Result<Value, String> {
        (self.f)(args)
    }
}

/// Invocable backed by a closure returning a future.
pub struct AsyncFnOperation<F> {
    signature: Signature,
    f: F,
}

impl<F, Fut> AsyncFnOperation<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    #[must_use]
    pub fn new(signature: Signature, f: F) -> Self {
        Self { signature, f }
    }
}

#[async_trait]
impl<F, Fut> Invocable for AsyncFnOperation<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    async fn invoke(&self, _ctx: &InvocationContext, args: Vec<Value>) -> Result<Value, String> {
        (self.f)(args).await
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Name table mapping `(interface, operation)` to invocable code.
///
/// Populated at startup; lookups are lock-free reads on a [`DashMap`].
/// Registering the same pair twice replaces the earlier entry.
pub struct OperationRegistry {
    operations: DashMap<(String, String), Arc<dyn Invocable>>,
    /// Registration order, for listing.
    order: RwLock<Vec<(String, String)>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers an invocable under `interface.operation`.
    pub fn register(
        &self,
        interface: impl Into<String>,
        operation: impl Into<String>,
        invocable: impl Invocable + 'static,
    ) {
        self.register_arc(interface, operation, Arc::new(invocable));
    }

    pub fn register_arc(
        &self,
        interface: impl Into<String>,
        operation: impl Into<String>,
        invocable: Arc<dyn Invocable>,
    ) {
        let key = (interface.into(), operation.into());
        debug!(interface = %key.0, operation = %key.1, "registering operation");
        if self.operations.insert(key.clone(), invocable).is_none() {
            self.order.write().push(key);
        }
    }

    /// Registers a synchronous closure.
    pub fn register_fn<F>(
        &self,
        interface: impl Into<String>,
        operation: impl Into<String>,
        signature: Signature,
        f: F,
    ) where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(interface, operation, FnOperation::new(signature, f));
    }

    /// Registers an async closure.
    pub fn register_async<F, Fut>(
        &self,
        interface: impl Into<String>,
        operation: impl Into<String>,
        signature: Signature,
        f: F,
    ) where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.register(interface, operation, AsyncFnOperation::new(signature, f));
    }

    /// Registered `interface.operation` names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order
            .read()
            .iter()
            .map(|(interface, operation)| format!("{interface}.{operation}"))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry for OperationRegistry {
    fn resolve(&self, interface: &str, operation: &str) -> Option<Arc<dyn Invocable>> {
        self.operations
            .get(&(interface.to_string(), operation.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use appbus_core::{InstanceRef, InvocationTarget, ParamType, TicketId};
    use serde_json::json;

    use super::*;

    fn ctx() -> InvocationContext {
        InvocationContext {
            ticket_id: TicketId(1),
            interface: "Math".to_string(),
            operation: "double".to_string(),
            target: InvocationTarget::NodeInstance {
                node_instance_id: InstanceRef::Number(1),
            },
        }
    }

    fn double(args: Vec<Value>) -> Result<Value, String> {
        let n = args[0].as_i64().ok_or("not an integer")?;
        Ok(json!(n * 2))
    }

    #[tokio::test]
    async fn resolves_registered_closure() {
        let registry = OperationRegistry::new();
        registry.register_fn(
            "Math",
            "double",
            Signature::empty().param("n", ParamType::Integer),
            double,
        );

        let op = registry.resolve("Math", "double").unwrap();
        assert_eq!(op.signature().arity(), 1);
        assert_eq!(op.invoke(&ctx(), vec![json!(21)]).await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn resolves_async_closure() {
        let registry = OperationRegistry::new();
        registry.register_async("Math", "later", Signature::empty(), |_args| async {
            tokio::task::yield_now().await;
            Ok(json!("done"))
        });

        let op = registry.resolve("Math", "later").unwrap();
        assert_eq!(op.invoke(&ctx(), vec![]).await, Ok(json!("done")));
    }

    #[test]
    fn unknown_pairs_do_not_resolve() {
        let registry = OperationRegistry::new();
        registry.register_fn("Math", "double", Signature::empty(), |_| Ok(Value::Null));

        assert!(registry.resolve("Math", "triple").is_none());
        assert!(registry.resolve("math", "double").is_none());
        assert!(registry.resolve("Other", "double").is_none());
    }

    #[test]
    fn names_follow_registration_order_without_duplicates() {
        let registry = OperationRegistry::new();
        registry.register_fn("B", "two", Signature::empty(), |_| Ok(Value::Null));
        registry.register_fn("A", "one", Signature::empty(), |_| Ok(Value::Null));
        registry.register_fn("B", "two", Signature::empty(), |_| Ok(json!(2)));

        assert_eq!(registry.names(), vec!["B.two", "A.one"]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }
}
