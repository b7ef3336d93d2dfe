//! HTTP handler definitions for the `AppBus` server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod active_requests;
pub mod health;
pub mod invoke;
pub mod setup;

pub use active_requests::{poll_handler, result_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use invoke::submit_handler;
pub use setup::{get_setting_handler, settings_handler, setup_handler};

use std::sync::Arc;
use std::time::Instant;

use appbus_core::InstanceSettings;
use arc_swap::ArcSwap;

use super::{NetworkConfig, ShutdownController};
use crate::service::Dispatcher;
use crate::storage::TicketStore;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Issues tickets and runs invocations.
    pub dispatcher: Dispatcher,
    /// Ticket table shared with the dispatcher.
    pub store: Arc<TicketStore>,
    /// Settings pushed through the setup endpoint.
    pub settings: Arc<ArcSwap<InstanceSettings>>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, base path, public URL).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Path of the poll endpoint for `id`, relative to the server root.
    #[must_use]
    pub fn poll_path(&self, id: appbus_core::TicketId) -> String {
        format!("{}/activeRequests/{id}", self.config.normalized_base_path())
    }

    /// Path of the result endpoint for `id`.
    #[must_use]
    pub fn result_path(&self, id: appbus_core::TicketId) -> String {
        format!("{}/response", self.poll_path(id))
    }
}
