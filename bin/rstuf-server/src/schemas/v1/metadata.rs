use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rstuf_core::{
    DeleteSignMetadata, MetadataSignature, MetadataSubmission, MetadataUpdate, SignMetadata,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use super::bootstrap::{RootMetadataBody, Signature};

// ── Request ───────────────────────────────────────────────────────────────────

/// `POST /api/v1/metadata` body: new root metadata to rotate in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MetadataPostBody {
    #[validate(nested)]
    pub metadata: RootMetadataBody,
}

impl MetadataPostBody {
    pub fn into_update(self) -> Result<MetadataUpdate, serde_json::Error> {
        let mut metadata = Map::new();
        metadata.insert("root".to_owned(), serde_json::to_value(self.metadata.root)?);
        Ok(MetadataUpdate { metadata })
    }
}

/// `POST /api/v1/metadata/sign` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MetadataSignBody {
    #[validate(length(min = 1, message = "role must not be empty"))]
    pub role: String,
    #[validate(nested)]
    pub signature: Signature,
}

impl From<MetadataSignBody> for SignMetadata {
    fn from(body: MetadataSignBody) -> Self {
        SignMetadata {
            role: body.role,
            signature: MetadataSignature {
                keyid: body.signature.keyid,
                sig: body.signature.sig,
            },
        }
    }
}

/// `POST /api/v1/metadata/sign/delete` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MetadataSignDeleteBody {
    #[validate(length(min = 1, message = "role must not be empty"))]
    pub role: String,
}

impl From<MetadataSignDeleteBody> for DeleteSignMetadata {
    fn from(body: MetadataSignDeleteBody) -> Self {
        DeleteSignMetadata { role: body.role }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataPostData {
    pub task_id: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataPostResponse {
    pub data: MetadataPostData,
    pub message: String,
}

impl From<MetadataSubmission> for MetadataPostResponse {
    fn from(submission: MetadataSubmission) -> Self {
        Self {
            data: MetadataPostData {
                task_id: submission.task_id,
                last_update: submission.last_update,
            },
            message: submission.message.to_owned(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataSignData {
    /// Metadata awaiting signatures, keyed by role.
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataSignGetResponse {
    pub data: MetadataSignData,
    pub message: String,
}

impl From<BTreeMap<String, Value>> for MetadataSignGetResponse {
    fn from(metadata: BTreeMap<String, Value>) -> Self {
        Self {
            data: MetadataSignData { metadata },
            message: "Metadata role(s) pending signing".to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    use crate::schemas::v1::bootstrap::test::payload;

    #[test]
    fn rotation_keeps_only_root() {
        let body: MetadataPostBody =
            serde_json::from_value(json!({ "metadata": payload()["metadata"].clone() })).unwrap();
        assert!(body.validate().is_ok());
        let update = body.into_update().unwrap();
        assert_eq!(update.metadata.len(), 1);
        assert_eq!(update.metadata["root"]["signed"]["_type"], "root");
    }

    #[test]
    fn empty_signature_fields_are_rejected() {
        let body: MetadataSignBody = serde_json::from_value(json!({
            "role": "root",
            "signature": { "keyid": "", "sig": "3045022100" }
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }
}
