//! Submission endpoint: `POST <base>`.

use appbus_core::SubmissionReceipt;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;

use super::AppState;
use crate::network::error::{ApiError, ApiResult};

/// Validates the body, issues a ticket and answers `202 Accepted` with the
/// poll location. The invocation runs after the response is sent.
///
/// The body is read as raw bytes so that a missing or wrong `Content-Type`
/// does not turn into a rejection of its own.
pub async fn submit_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    if !state.shutdown.is_accepting() {
        return Err(ApiError::ShuttingDown);
    }

    let id = state.dispatcher.submit_json(&body)?;
    let location = state.config.location(&state.poll_path(id));

    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(SubmissionReceipt { ticket_id: id }),
    ))
}
