use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rstuf_core::bootstrap::DEFAULT_BOOTSTRAP_TIMEOUT;
use rstuf_core::types::{Role, ServiceSettings, Settings};
use rstuf_core::{BootstrapAccepted, BootstrapPayload, BootstrapStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Keys defined for the `signed` part of root metadata.
const ROOT_SIGNED_FIELDS: &[&str] = &[
    "_type",
    "version",
    "spec_version",
    "expires",
    "consistent_snapshot",
    "keys",
    "roles",
];

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ServiceSettingsBody {
    #[validate(length(min = 1, message = "targets_base_url must not be empty"))]
    pub targets_base_url: String,
    #[validate(range(min = 2, max = 16384))]
    pub number_of_delegated_bins: u32,
    pub targets_online_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SettingsBody {
    /// Expiration in days, keyed by role
    /// (`root`, `targets`, `snapshot`, `timestamp`, `bins`).
    #[validate(custom(function = "validate_expiration"))]
    #[schema(value_type = Object)]
    pub expiration: BTreeMap<Role, u32>,
    #[validate(nested)]
    pub services: ServiceSettingsBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct Signature {
    #[validate(length(min = 1, message = "keyid must not be empty"))]
    pub keyid: String,
    #[validate(length(min = 1, message = "sig must not be empty"))]
    pub sig: String,
}

/// A signed TUF metadata document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct TufMetadata {
    pub signatures: Vec<Signature>,
    #[validate(custom(function = "validate_signed_fields"))]
    #[schema(value_type = Object)]
    pub signed: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct RootMetadataBody {
    #[validate(nested)]
    pub root: TufMetadata,
}

fn default_timeout() -> u64 {
    DEFAULT_BOOTSTRAP_TIMEOUT.as_secs()
}

/// `POST /api/v1/bootstrap` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct BootstrapBody {
    #[validate(nested)]
    pub settings: SettingsBody,
    #[validate(nested)]
    pub metadata: RootMetadataBody,
    /// Seconds before the bootstrap task is cancelled and the lock released.
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,
}

impl BootstrapBody {
    pub fn into_payload(self) -> Result<BootstrapPayload, serde_json::Error> {
        let mut metadata = Map::new();
        metadata.insert("root".to_owned(), serde_json::to_value(self.metadata.root)?);
        let services = self.settings.services;
        Ok(BootstrapPayload {
            settings: Settings {
                expiration: self.settings.expiration,
                services: ServiceSettings {
                    targets_base_url: services.targets_base_url,
                    number_of_delegated_bins: services.number_of_delegated_bins,
                    targets_online_key: services.targets_online_key,
                },
            },
            metadata,
            timeout: self.timeout,
        })
    }
}

fn validate_expiration(expiration: &BTreeMap<Role, u32>) -> Result<(), ValidationError> {
    match expiration.iter().find(|(_, days)| **days == 0) {
        Some((role, _)) => Err(ValidationError::new("range")
            .with_message(Cow::Owned(format!("expiration for {role} must be at least 1 day")))),
        None => Ok(()),
    }
}

/// Every key outside the TUF root schema must look like `x-<vendor>-<name>`.
fn validate_signed_fields(signed: &Map<String, Value>) -> Result<(), ValidationError> {
    let invalid = signed
        .keys()
        .filter(|key| !ROOT_SIGNED_FIELDS.contains(&key.as_str()))
        .any(|key| !is_vendor_field(key));
    if invalid {
        return Err(ValidationError::new("unrecognized_field").with_message(Cow::Borrowed(
            "unrecognized_field must use format x-<vendor>-<name>",
        )));
    }
    Ok(())
}

fn is_vendor_field(key: &str) -> bool {
    key.strip_prefix("x-")
        .and_then(|rest| rest.split_once('-'))
        .is_some_and(|(vendor, name)| !vendor.is_empty() && !name.is_empty())
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct BootstrapGetData {
    pub bootstrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BootstrapGetResponse {
    pub data: BootstrapGetData,
    pub message: String,
}

impl From<BootstrapStatus> for BootstrapGetResponse {
    fn from(status: BootstrapStatus) -> Self {
        let message = status.message().to_owned();
        Self {
            data: BootstrapGetData {
                bootstrap: status.bootstrap,
                state: status.state.map(|s| s.to_string()),
                id: status.task_id,
            },
            message,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BootstrapPostData {
    pub task_id: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BootstrapPostResponse {
    pub data: BootstrapPostData,
    pub message: String,
}

impl From<BootstrapAccepted> for BootstrapPostResponse {
    fn from(accepted: BootstrapAccepted) -> Self {
        let message = accepted.message().to_owned();
        Self {
            data: BootstrapPostData {
                task_id: accepted.task_id,
                last_update: accepted.last_update,
            },
            message,
        }
    }
}
