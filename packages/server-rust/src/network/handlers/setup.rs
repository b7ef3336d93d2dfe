//! Instance setup endpoints under `/appbus/v1/setup`.
//!
//! A deployment pushes the container URL and the instance ids of the
//! application (and of its host) once; later requests read them back.

use std::sync::Arc;

use appbus_core::settings::SETTING_KEYS;
use appbus_core::InstanceSettings;
use axum::extract::{Path, State};
use axum::Form;
use axum::Json;
use tracing::{debug, info};

use super::AppState;
use crate::network::error::{ApiError, ApiResult};

/// `POST /appbus/v1/setup` with an `application/x-www-form-urlencoded` body.
///
/// Known keys are applied all-or-nothing: if any value fails to parse the
/// stored settings are left untouched. Unrecognised keys are ignored.
/// Concurrent posts that set different keys all take effect.
pub async fn setup_handler(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> ApiResult<Json<InstanceSettings>> {
    let mut patch = InstanceSettings::default();
    for (key, value) in &pairs {
        if SETTING_KEYS.contains(&key.as_str()) {
            patch.apply(key, value)?;
        } else {
            debug!(key = %key, "ignoring unknown setup key");
        }
    }

    let previous = state
        .settings
        .rcu(|current| Arc::new(current.merged_with(&patch)));
    let updated = previous.merged_with(&patch);

    info!(
        container_url = ?updated.container_url,
        self_service_instance_id = ?updated.self_service_instance_id,
        host_service_instance_id = ?updated.host_service_instance_id,
        self_node_instance_id = ?updated.self_node_instance_id,
        host_node_instance_id = ?updated.host_node_instance_id,
        "instance settings updated"
    );
    Ok(Json(updated))
}

/// `GET /appbus/v1/setup`: every setting as JSON.
pub async fn settings_handler(State(state): State<AppState>) -> Json<InstanceSettings> {
    Json(InstanceSettings::clone(&state.settings.load()))
}

/// `GET /appbus/v1/setup/{key}`: one setting as plain text.
pub async fn get_setting_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<String> {
    state
        .settings
        .load()
        .get(&key)?
        .ok_or(ApiError::SettingNotSet(key))
}
