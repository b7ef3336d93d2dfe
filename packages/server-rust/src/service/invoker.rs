//! Innermost service of the dispatch pipeline: runs the invocable.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::task::AbortHandle;
use tower::Service;

use super::operation::{Invocation, InvocationError};

/// Runs each invocation on its own tokio task.
///
/// A panic inside the operation surfaces as a `JoinError` and is reported as
/// [`InvocationError::Panicked`]. Dropping the returned future (for example
/// when the timeout layer gives up) aborts the task.
#[derive(Debug, Clone, Default)]
pub struct InvokeService;

/// Aborts the wrapped task when dropped. No-op if the task already finished.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Service<Invocation> for InvokeService {
    type Response = Value;
    type Error = InvocationError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, InvocationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let Invocation {
            ctx,
            invocable,
            args,
            ..
        } = invocation;

        let handle = tokio::spawn(async move { invocable.invoke(&ctx, args).await });
        let guard = AbortOnDrop(handle.abort_handle());

        Box::pin(async move {
            let joined = handle.await;
            drop(guard);
            match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(InvocationError::Failed(message)),
                Err(join_err) if join_err.is_panic() => {
                    Err(InvocationError::Panicked(panic_message(join_err.into_panic())))
                }
                Err(_) => Err(InvocationError::Unavailable),
            }
        })
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
