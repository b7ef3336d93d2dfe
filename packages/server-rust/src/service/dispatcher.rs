//! Submission and dispatch of invocations.
//!
//! `submit` validates the request, issues a ticket and returns at once. The
//! invocation itself runs on a detached tokio task which resolves the
//! operation, binds its arguments, pushes it through the middleware pipeline
//! and finally writes exactly one outcome to the ticket store.

use std::sync::Arc;

use appbus_core::{
    CapabilityRegistry, Failure, InvocationContext, InvocationRequest, Outcome, TicketId,
};
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::config::ServerConfig;
use super::middleware::{build_invocation_pipeline, InvocationPipeline, InvocationStats};
use super::operation::{Invocation, SubmitError};
use crate::network::ShutdownController;
use crate::storage::TicketStore;

/// Issues tickets and runs invocations in the background.
///
/// Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<TicketStore>,
    registry: Arc<dyn CapabilityRegistry>,
    pipeline: InvocationPipeline,
    stats: Arc<InvocationStats>,
    shutdown: Arc<ShutdownController>,
    config: Arc<ServerConfig>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        store: Arc<TicketStore>,
        registry: Arc<dyn CapabilityRegistry>,
        shutdown: Arc<ShutdownController>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let stats = Arc::new(InvocationStats::default());
        let pipeline = build_invocation_pipeline(&config, Arc::clone(&stats));
        Self {
            store,
            registry,
            pipeline,
            stats,
            shutdown,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TicketStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Outcome counters of every invocation that reached the pipeline.
    #[must_use]
    pub fn stats(&self) -> &InvocationStats {
        &self.stats
    }

    /// Parses a raw submission body and submits it.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::submit`]; unparseable bodies are
    /// [`SubmitError::Malformed`].
    pub fn submit_json(&self, body: &[u8]) -> Result<TicketId, SubmitError> {
        let request = InvocationRequest::from_json(body)?;
        self.submit(request)
    }

    /// Issues a ticket for `request` and starts the invocation in the
    /// background. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Unresolvable`] when strict resolution is
    /// enabled and the operation is not registered. No ticket is created.
    pub fn submit(&self, request: InvocationRequest) -> Result<TicketId, SubmitError> {
        if self.config.strict_resolution
            && self
                .registry
                .resolve(&request.interface, &request.operation)
                .is_none()
        {
            return Err(SubmitError::Unresolvable {
                interface: request.interface,
                operation: request.operation,
            });
        }

        let id = self.store.create();
        let guard = self.shutdown.begin_dispatch();
        info!(
            ticket_id = %id,
            operation = %request.qualified_name(),
            target = %request.target,
            "ticket issued"
        );

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.execute(id, request).await;
            if let Err(err) = this.store.complete(id, outcome) {
                warn!(ticket_id = %id, error = %err, "outcome not recorded");
            }
            drop(guard);
        });

        Ok(id)
    }

    /// Resolves, binds and runs one invocation. Never fails: every problem
    /// becomes a failure outcome.
    pub async fn execute(&self, id: TicketId, request: InvocationRequest) -> Outcome {
        let name = request.qualified_name();

        let Some(invocable) = self
            .registry
            .resolve(&request.interface, &request.operation)
        else {
            debug!(ticket_id = %id, operation = %name, "operation not registered");
            return Outcome::Failure(Failure::resolution(format!(
                "no operation `{name}` is registered"
            )));
        };

        let args = match invocable.signature().bind(request.arguments()) {
            Ok(args) => args,
            Err(err) => {
                debug!(ticket_id = %id, operation = %name, error = %err, "argument binding failed");
                return Outcome::Failure(Failure::invocation(format!("`{name}`: {err}")));
            }
        };

        let invocation = Invocation {
            ctx: InvocationContext {
                ticket_id: id,
                interface: request.interface,
                operation: request.operation,
                target: request.target,
            },
            invocable,
            args,
            timeout_ms: self.config.default_invocation_timeout_ms,
        };

        match self.pipeline.clone().oneshot(invocation).await {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
