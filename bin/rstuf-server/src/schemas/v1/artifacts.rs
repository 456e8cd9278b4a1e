use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rstuf_core::types::{Artifact, ArtifactInfo};
use rstuf_core::{AddArtifacts, RemoveArtifacts, Submission};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use super::default_true;

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ArtifactInfoBody {
    pub length: u64,
    /// Digests keyed by an algorithm supported by TUF clients.
    #[validate(length(min = 1, message = "at least one hash is required"))]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub custom: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ArtifactBody {
    #[validate(nested)]
    pub info: ArtifactInfoBody,
    #[validate(length(min = 1, message = "path must not be empty"))]
    pub path: String,
}

/// `POST /api/v1/artifacts` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AddArtifactsBody {
    #[validate(nested)]
    pub targets: Vec<ArtifactBody>,
    /// Record the task id as `added_by_task_id` in each artifact's custom metadata.
    #[serde(default)]
    pub add_task_id_to_custom: bool,
    #[serde(default = "default_true")]
    pub publish_targets: bool,
}

impl From<AddArtifactsBody> for AddArtifacts {
    fn from(body: AddArtifactsBody) -> Self {
        AddArtifacts {
            targets: body
                .targets
                .into_iter()
                .map(|t| Artifact {
                    info: ArtifactInfo {
                        length: t.info.length,
                        hashes: t.info.hashes,
                        custom: t.info.custom,
                    },
                    path: t.path,
                })
                .collect(),
            add_task_id_to_custom: body.add_task_id_to_custom,
            publish_targets: body.publish_targets,
        }
    }
}

/// `DELETE /api/v1/artifacts` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct DeleteArtifactsBody {
    #[validate(length(min = 1, message = "at least one artifact path is required"))]
    pub targets: Vec<String>,
    #[serde(default = "default_true")]
    pub publish_targets: bool,
}

impl From<DeleteArtifactsBody> for RemoveArtifacts {
    fn from(body: DeleteArtifactsBody) -> Self {
        RemoveArtifacts {
            targets: body.targets,
            publish_targets: body.publish_targets,
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtifactsData {
    pub targets: Vec<String>,
    pub task_id: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtifactsResponse {
    pub data: ArtifactsData,
    pub message: String,
}

impl From<Submission> for ArtifactsResponse {
    fn from(submission: Submission) -> Self {
        Self {
            data: ArtifactsData {
                targets: submission.targets,
                task_id: submission.task_id,
                last_update: submission.last_update,
            },
            message: submission.message,
        }
    }
}
