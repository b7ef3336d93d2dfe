//! Instance settings pushed to a deployed application at setup time.
//!
//! A deployed application learns which node/service instance it runs as (and
//! which one hosts it) plus the container URL of the invocation service.
//! Clients use these to pick a default invocation target.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::invocation::{InstanceRef, InvocationTarget};

pub const CONTAINER_URL_KEY: &str = "container-url";
pub const SELF_SERVICE_INSTANCE_ID_KEY: &str = "self-service-instance-id";
pub const HOST_SERVICE_INSTANCE_ID_KEY: &str = "host-service-instance-id";
pub const SELF_NODE_INSTANCE_ID_KEY: &str = "self-node-instance-id";
pub const HOST_NODE_INSTANCE_ID_KEY: &str = "host-node-instance-id";

/// All recognised setting keys, in the order they are applied.
pub const SETTING_KEYS: [&str; 5] = [
    CONTAINER_URL_KEY,
    SELF_SERVICE_INSTANCE_ID_KEY,
    HOST_SERVICE_INSTANCE_ID_KEY,
    HOST_NODE_INSTANCE_ID_KEY,
    SELF_NODE_INSTANCE_ID_KEY,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingError {
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("can't read `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    pub container_url: Option<String>,
    pub self_service_instance_id: Option<u64>,
    pub host_service_instance_id: Option<u64>,
    pub self_node_instance_id: Option<u64>,
    pub host_node_instance_id: Option<u64>,
}

impl InstanceSettings {
    /// Applies one `key=value` pair. Unset fields stay untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::UnknownKey`] for unrecognised keys and
    /// [`SettingError::InvalidValue`] when the value does not parse.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        let value = value.trim();
        match key {
            CONTAINER_URL_KEY => {
                self.container_url = Some(parse_url(value)?);
            }
            SELF_SERVICE_INSTANCE_ID_KEY => {
                self.self_service_instance_id = Some(parse_id(SELF_SERVICE_INSTANCE_ID_KEY, value)?);
            }
            HOST_SERVICE_INSTANCE_ID_KEY => {
                self.host_service_instance_id = Some(parse_id(HOST_SERVICE_INSTANCE_ID_KEY, value)?);
            }
            SELF_NODE_INSTANCE_ID_KEY => {
                self.self_node_instance_id = Some(parse_id(SELF_NODE_INSTANCE_ID_KEY, value)?);
            }
            HOST_NODE_INSTANCE_ID_KEY => {
                self.host_node_instance_id = Some(parse_id(HOST_NODE_INSTANCE_ID_KEY, value)?);
            }
            other => return Err(SettingError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// `self` with every field that `patch` sets taken from `patch`.
    #[must_use]
    pub fn merged_with(&self, patch: &InstanceSettings) -> Self {
        Self {
            container_url: patch.container_url.clone().or_else(|| self.container_url.clone()),
            self_service_instance_id: patch.self_service_instance_id.or(self.self_service_instance_id),
            host_service_instance_id: patch.host_service_instance_id.or(self.host_service_instance_id),
            self_node_instance_id: patch.self_node_instance_id.or(self.self_node_instance_id),
            host_node_instance_id: patch.host_node_instance_id.or(self.host_node_instance_id),
        }
    }

    /// Reads one setting as text; `Ok(None)` if the key is known but unset.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::UnknownKey`] for unrecognised keys.
    pub fn get(&self, key: &str) -> Result<Option<String>, SettingError> {
        let value = match key {
            CONTAINER_URL_KEY => self.container_url.clone(),
            SELF_SERVICE_INSTANCE_ID_KEY => self.self_service_instance_id.map(|v| v.to_string()),
            HOST_SERVICE_INSTANCE_ID_KEY => self.host_service_instance_id.map(|v| v.to_string()),
            SELF_NODE_INSTANCE_ID_KEY => self.self_node_instance_id.map(|v| v.to_string()),
            HOST_NODE_INSTANCE_ID_KEY => self.host_node_instance_id.map(|v| v.to_string()),
            other => return Err(SettingError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// Picks the invocation target an application should address by default.
    ///
    /// Preference: hosting node instance, then hosting service instance, then
    /// the application's own service instance. Service targets use
    /// `node_template_id`.
    #[must_use]
    pub fn preferred_target(&self, node_template_id: &str) -> Option<InvocationTarget> {
        if let Some(id) = self.host_node_instance_id {
            return Some(InvocationTarget::NodeInstance {
                node_instance_id: InstanceRef::Number(id),
            });
        }
        self.host_service_instance_id
            .or(self.self_service_instance_id)
            .map(|id| InvocationTarget::ServiceInstance {
                service_instance_id: InstanceRef::Number(id),
                node_template_id: node_template_id.to_string(),
            })
    }
}

fn parse_id(key: &'static str, value: &str) -> Result<u64, SettingError> {
    value.parse().map_err(|e: std::num::ParseIntError| SettingError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

/// Parses an absolute http(s) URL with a host and returns its normalized
/// form (lower-case scheme and host). A bare trailing `/` is dropped.
fn parse_url(value: &str) -> Result<String, SettingError> {
    let invalid = |reason: String| SettingError::InvalidValue {
        key: CONTAINER_URL_KEY,
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(format!("`{value}`: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("`{value}` is not an http(s) URL")));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("`{value}` has no host")));
    }

    let mut normalized = String::from(url);
    if normalized.ends_with('/') && !normalized.contains(['?', '#']) {
        normalized.pop();
    }
    Ok(normalized)
}
