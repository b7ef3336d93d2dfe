//! Poll and result endpoints under `<base>/activeRequests/{id}`.
//!
//! Polling never changes ticket state. A ready ticket answers with
//! `303 See Other` pointing at its result endpoint; clients must not
//! auto-follow it if they want to tell the two phases apart.

use appbus_core::{PollStatusBody, ResultEnvelope, TicketStatus};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::AppState;
use crate::network::error::{parse_ticket_ref, ApiResult};
use crate::storage::StoreError;

/// `GET <base>/activeRequests/{id}`: 200 `{"status":"PENDING"}` while the
/// invocation runs, 303 to the result endpoint once it has an outcome.
pub async fn poll_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_ticket_ref(&raw_id)?;
    match state.store.status(id) {
        None => Err(StoreError::UnknownTicket(id).into()),
        Some(TicketStatus::Pending) => Ok(Json(PollStatusBody::pending()).into_response()),
        Some(TicketStatus::Ready) => {
            let location = state.config.location(&state.result_path(id));
            Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
        }
    }
}

/// `GET <base>/activeRequests/{id}/response`: the stored outcome, identical
/// on every call.
pub async fn result_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<ResultEnvelope>> {
    let id = parse_ticket_ref(&raw_id)?;
    let outcome = state.store.fetch(id)?;
    Ok(Json(ResultEnvelope::from(outcome.as_ref())))
}
