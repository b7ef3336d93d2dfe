//! Shared fixtures for middleware tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use appbus_core::{InstanceRef, InvocationContext, InvocationTarget, Signature, TicketId};
use serde_json::{json, Value};
use tower::Service;

use crate::service::operation::{Invocation, InvocationError};
use crate::service::registry::FnOperation;

/// Builds an invocation of a no-op operation with the given timeout.
pub(crate) fn make_invocation(ticket: u64, timeout_ms: u64) -> Invocation {
    Invocation {
        ctx: InvocationContext {
            ticket_id: TicketId(ticket),
            interface: "Test".to_string(),
            operation: "noop".to_string(),
            target: InvocationTarget::NodeInstance {
                node_instance_id: InstanceRef::Number(1),
            },
        },
        invocable: Arc::new(FnOperation::new(Signature::empty(), |_| Ok(Value::Null))),
        args: Vec::new(),
        timeout_ms,
    }
}

/// Service that waits `delay_ms`, then answers with the ticket id.
#[derive(Clone)]
pub(crate) struct SlowService {
    pub delay_ms: u64,
}

impl Service<Invocation> for SlowService {
    type Response = Value;
    type Error = InvocationError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let delay = self.delay_ms;
        let ticket = invocation.ctx.ticket_id.0;
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(json!(ticket))
        })
    }
}
