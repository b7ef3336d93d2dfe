//! `/health`, `/health/live` and `/health/ready`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::service::middleware::InvocationCounts;
use crate::storage::TicketStats;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub state: &'static str,
    pub node_id: String,
    pub tickets: TicketStats,
    /// Issued tickets whose invocation has not recorded an outcome yet.
    pub running_dispatches: u64,
    pub invocations: InvocationCounts,
    pub uptime_secs: u64,
}

/// Always 200; the `state` field says whether submissions are accepted.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        state: state.shutdown.health_state().as_str(),
        node_id: state.dispatcher.config().node_id.clone(),
        tickets: state.store.stats(),
        running_dispatches: state.shutdown.running_dispatches(),
        invocations: state.dispatcher.stats().snapshot(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// The process answers, so it is alive.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 exactly when new submissions would be accepted.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.is_accepting() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
