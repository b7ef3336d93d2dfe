//! HTTP server assembly for the polling protocol.
//!
//! [`NetworkModule`] owns the ticket store, settings cell and shutdown
//! controller. Binding (`start`) and serving (`serve`) are separate steps so
//! a caller can learn the bound port, and take shared handles, before the
//! first request arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use appbus_core::{CapabilityRegistry, InstanceSettings};
use arc_swap::ArcSwap;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, SETUP_PATH};
use super::handlers::{
    get_setting_handler, health_handler, liveness_handler, poll_handler, readiness_handler,
    result_handler, settings_handler, setup_handler, submit_handler, AppState,
};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::service::{BackgroundWorker, Dispatcher, EvictionSweeper, ServerConfig};
use crate::storage::TicketStore;

/// Routes plus the HTTP middleware from [`with_http_layers`].
///
/// Routes (`<base>` is [`NetworkConfig::base_path`]):
/// - `POST <base>` -- submit an invocation
/// - `GET <base>/activeRequests/{id}` -- poll a ticket
/// - `GET <base>/activeRequests/{id}/response` -- fetch the outcome
/// - `POST /appbus/v1/setup`, `GET /appbus/v1/setup[/{key}]` -- instance settings
/// - `GET /health`, `/health/live`, `/health/ready` -- probes
pub fn build_router(state: AppState) -> Router {
    let base = state.config.normalized_base_path();
    let submit_path = if base.is_empty() { "/".to_string() } else { base.clone() };
    let config = Arc::clone(&state.config);

    let router = Router::new()
        .route(&submit_path, post(submit_handler))
        .route(&format!("{base}/activeRequests/{{id}}"), get(poll_handler))
        .route(
            &format!("{base}/activeRequests/{{id}}/response"),
            get(result_handler),
        )
        .route(SETUP_PATH, post(setup_handler).get(settings_handler))
        .route(&format!("{SETUP_PATH}/{{key}}"), get(get_setting_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state);
    with_http_layers(router, &config)
}

/// One `AppBus` server instance.
///
/// `new()` allocates state without touching the network, `start()` binds,
/// and `serve()` answers requests until its shutdown future resolves.
pub struct NetworkModule {
    config: NetworkConfig,
    server_config: Arc<ServerConfig>,
    listener: Option<TcpListener>,
    store: Arc<TicketStore>,
    registry: Arc<dyn CapabilityRegistry>,
    settings: Arc<ArcSwap<InstanceSettings>>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// No socket is opened until [`NetworkModule::start`].
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        server_config: ServerConfig,
        registry: Arc<dyn CapabilityRegistry>,
    ) -> Self {
        Self {
            config,
            server_config: Arc::new(server_config),
            listener: None,
            store: Arc::new(TicketStore::new()),
            registry,
            settings: Arc::new(ArcSwap::from_pointee(InstanceSettings::default())),
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Tickets issued by this server.
    #[must_use]
    pub fn store(&self) -> Arc<TicketStore> {
        Arc::clone(&self.store)
    }

    /// Serving state shared with the handlers and the dispatcher.
    /// Triggering it refuses new submissions but keeps the listener open.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Returns the settings cell written by the setup endpoint.
    #[must_use]
    pub fn settings(&self) -> Arc<ArcSwap<InstanceSettings>> {
        Arc::clone(&self.settings)
    }

    /// Builds the shared handler state.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState {
            dispatcher: Dispatcher::new(
                Arc::clone(&self.store),
                Arc::clone(&self.registry),
                Arc::clone(&self.shutdown),
                Arc::clone(&self.server_config),
            ),
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        }
    }

    /// Binds `host:port` and returns the bound port, which is only known
    /// here when port 0 was configured.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Answers requests until `shutdown` resolves, then:
    ///
    /// 1. the state becomes Draining and new submissions get 503
    /// 2. open HTTP requests are allowed to finish
    /// 3. running invocations get up to `drain_timeout` to store outcomes
    /// 4. the state becomes Stopped once none remain
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// encounters a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = build_router(self.app_state());

        let eviction = if self.server_config.eviction_enabled() {
            info!(
                retrieved_ttl = ?self.server_config.retrieved_ttl,
                unclaimed_ttl = ?self.server_config.unclaimed_ttl,
                "ticket eviction enabled"
            );
            Some(BackgroundWorker::start(
                EvictionSweeper::new(Arc::clone(&self.store), &self.server_config),
                Duration::from_millis(self.server_config.eviction_interval_ms),
            ))
        } else {
            None
        };

        self.shutdown.set_ready();
        info!(base_path = %self.config.normalized_base_path(), "Serving HTTP connections");

        let shutdown_ctrl = Arc::clone(&self.shutdown);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                shutdown_ctrl.trigger_shutdown();
            })
            .await?;

        drain_invocations(&self.shutdown, &self.config).await;
        if let Some(worker) = eviction {
            let sweeper = worker.stop().await?;
            info!(evicted = sweeper.evicted_total(), "ticket eviction stopped");
        }
        Ok(())
    }
}

/// Gives running invocations `drain_timeout` to record their outcomes.
async fn drain_invocations(shutdown_ctrl: &ShutdownController, config: &NetworkConfig) {
    shutdown_ctrl.trigger_shutdown();

    let running = shutdown_ctrl.running_dispatches();
    if running > 0 {
        info!(running, "waiting for running invocations");
    }

    if shutdown_ctrl.wait_for_drain(config.drain_timeout).await {
        info!("all invocations recorded an outcome");
    } else {
        warn!(
            still_running = shutdown_ctrl.running_dispatches(),
            "drain timeout expired"
        );
    }
}
