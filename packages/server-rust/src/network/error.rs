//! HTTP error mapping.
//!
//! Every transport-level failure becomes a JSON body of the form
//! `{"error": {"code": ..., "message": ...}}`. Failed invocations are not
//! errors at this level: they are stored outcomes served with 200.

use appbus_core::{ErrorBody, RequestError, SettingError, TicketId};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::service::SubmitError;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A ticket reference that looks like an id but can never have been
    /// issued (negative, or beyond the id range).
    #[error("unknown ticket {0}")]
    UnknownTicketRef(String),

    #[error("malformed ticket reference `{0}`")]
    MalformedTicketRef(String),

    #[error(transparent)]
    Setting(#[from] SettingError),

    #[error("setting `{0}` has not been set")]
    SettingNotSet(String),

    #[error("server is shutting down")]
    ShuttingDown,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status code and stable error code for this error.
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Submit(SubmitError::Malformed(_)) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_REQUEST")
            }
            Self::Submit(SubmitError::Unresolvable { .. }) => {
                (StatusCode::BAD_REQUEST, "UNRESOLVABLE_OPERATION")
            }
            Self::Store(StoreError::UnknownTicket(_)) | Self::UnknownTicketRef(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_TICKET")
            }
            Self::Store(StoreError::NotReady(_)) => (StatusCode::CONFLICT, "NOT_READY"),
            Self::Store(StoreError::AlreadyCompleted(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::MalformedTicketRef(_) => (StatusCode::BAD_REQUEST, "MALFORMED_TICKET_REFERENCE"),
            Self::Setting(SettingError::UnknownKey(_)) => (StatusCode::BAD_REQUEST, "UNKNOWN_SETTING"),
            Self::Setting(SettingError::InvalidValue { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_SETTING")
            }
            Self::SettingNotSet(_) => (StatusCode::NOT_FOUND, "SETTING_NOT_SET"),
            Self::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN"),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::Submit(SubmitError::Malformed(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(code, error = %self, "request rejected");
        }
        (status, Json(ErrorBody::new(code, self.to_string()))).into_response()
    }
}

/// Parses the `{id}` path segment of the poll and result endpoints.
///
/// Decimal ids in range parse to a [`TicketId`] (0 included; the store
/// reports it unknown). Integers that cannot be an issued id are unknown
/// tickets; anything else is malformed.
///
/// # Errors
///
/// [`ApiError::UnknownTicketRef`] or [`ApiError::MalformedTicketRef`].
pub fn parse_ticket_ref(raw: &str) -> ApiResult<TicketId> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<u64>() {
        return Ok(TicketId(id));
    }
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Err(ApiError::UnknownTicketRef(trimmed.to_string()))
    } else {
        Err(ApiError::MalformedTicketRef(raw.to_string()))
    }
}
