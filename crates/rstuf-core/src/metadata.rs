//! Metadata rotation and offline signing.
//!
//! Rotation needs a finished bootstrap. Signing and discarding a signing
//! round are also accepted while the bootstrap itself waits in `signing`
//! for offline keys. Every submission is a single enqueue on the metadata
//! queue; the worker does the rest.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Requirement, ServiceError};
use crate::targets::TaskSubmissionService;
use crate::types::{self, Action, TaskId};

/// New role metadata to rotate in. Only `root` is accepted at the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSignature {
    pub keyid: String,
    pub sig: String,
}

/// One signature for the metadata of `role` awaiting signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignMetadata {
    pub role: String,
    pub signature: MetadataSignature,
}

/// Abandon the signing round of `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSignMetadata {
    pub role: String,
}

/// Result of an accepted metadata submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataSubmission {
    pub task_id: TaskId,
    pub last_update: NaiveDateTime,
    #[serde(skip)]
    pub message: &'static str,
}

impl TaskSubmissionService {
    /// Queue a metadata rotation.
    pub async fn update_metadata(
        &self,
        request: MetadataUpdate,
    ) -> Result<MetadataSubmission, ServiceError> {
        self.require_bootstrap(Requirement::Finished).await?;
        self.submit_metadata(
            Action::MetadataUpdate,
            serde_json::to_value(&request)?,
            "Metadata update accepted.",
        )
        .await
    }

    /// Queue one signature for metadata awaiting signing.
    pub async fn sign_metadata(
        &self,
        request: SignMetadata,
    ) -> Result<MetadataSubmission, ServiceError> {
        self.require_bootstrap(Requirement::Started).await?;
        self.submit_metadata(
            Action::SignMetadata,
            serde_json::to_value(&request)?,
            "Metadata sign accepted.",
        )
        .await
    }

    /// Queue the removal of a pending signing round.
    pub async fn delete_sign_metadata(
        &self,
        request: DeleteSignMetadata,
    ) -> Result<MetadataSubmission, ServiceError> {
        self.require_bootstrap(Requirement::Started).await?;
        self.submit_metadata(
            Action::DeleteSignMetadata,
            serde_json::to_value(&request)?,
            "Metadata sign delete accepted.",
        )
        .await
    }

    /// Role metadata currently waiting for signatures, keyed by role.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NothingToSign`] while no root metadata exists yet.
    pub async fn pending_signing(&self) -> Result<BTreeMap<String, Value>, ServiceError> {
        match self.store().get_bootstrap_record().await? {
            Some(record) if record.state.accepts_signatures() => {
                Ok(self.store().pending_signing().await?)
            }
            record => Err(ServiceError::NothingToSign {
                state: record.map(|r| r.state),
            }),
        }
    }

    async fn submit_metadata(
        &self,
        action: Action,
        payload: Value,
        message: &'static str,
    ) -> Result<MetadataSubmission, ServiceError> {
        let task_id = self.next_task_id();
        self.enqueue(&task_id, action, payload).await?;
        Ok(MetadataSubmission {
            task_id,
            last_update: types::now(),
            message,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::backend::memory::{MemoryStateStore, MemoryTaskQueue};
    use crate::types::{AckMode, BootstrapRecord, BootstrapState, QueueName};

    fn service(
        state: Option<BootstrapState>,
    ) -> (TaskSubmissionService, Arc<MemoryStateStore>, Arc<MemoryTaskQueue>) {
        let store = Arc::new(match state {
            Some(state) => MemoryStateStore::with_record(BootstrapRecord {
                task_id: "bootstrap".into(),
                state,
            }),
            None => MemoryStateStore::new(),
        });
        let queue = Arc::new(MemoryTaskQueue::new());
        let service = TaskSubmissionService::new(store.clone(), queue.clone());
        (service, store, queue)
    }

    fn signature() -> SignMetadata {
        SignMetadata {
            role: "root".into(),
            signature: MetadataSignature {
                keyid: "50d7e110".into(),
                sig: "3045022100".into(),
            },
        }
    }

    fn root_update() -> MetadataUpdate {
        let mut metadata = Map::new();
        metadata.insert(
            "root".into(),
            json!({ "signatures": [], "signed": { "_type": "root", "version": 2 } }),
        );
        MetadataUpdate { metadata }
    }

    #[tokio::test]
    async fn rotation_is_queued_after_bootstrap() {
        let (service, _, queue) = service(Some(BootstrapState::Finished));
        let submission = service.update_metadata(root_update()).await.unwrap();
        assert_eq!(submission.message, "Metadata update accepted.");

        let submitted = queue.submitted();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0];
        assert_eq!(request.task_id, submission.task_id);
        assert_eq!(request.action, Action::MetadataUpdate);
        assert_eq!(request.queue, QueueName::MetadataRepository);
        assert_eq!(request.ack_mode, AckMode::Late);
        assert_eq!(request.payload["metadata"]["root"]["signed"]["version"], 2);
    }

    #[tokio::test]
    async fn rotation_requires_finished_bootstrap() {
        for state in [None, Some(BootstrapState::Pre), Some(BootstrapState::Signing)] {
            let (service, _, queue) = service(state);
            let err = service.update_metadata(root_update()).await.unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Precondition { requires: Requirement::Finished, state: s } if s == state
            ));
            assert!(queue.submitted().is_empty());
        }
    }

    #[tokio::test]
    async fn signing_is_accepted_during_bootstrap_signing() {
        for state in [BootstrapState::Signing, BootstrapState::Finished] {
            let (service, _, queue) = service(Some(state));
            let submission = service.sign_metadata(signature()).await.unwrap();
            assert_eq!(submission.message, "Metadata sign accepted.");

            let submitted = queue.submitted();
            let request = &submitted[0];
            assert_eq!(request.action, Action::SignMetadata);
            assert_eq!(
                request.payload,
                json!({ "role": "root", "signature": { "keyid": "50d7e110", "sig": "3045022100" } })
            );
        }
    }

    #[tokio::test]
    async fn signing_requires_started_bootstrap() {
        for state in [None, Some(BootstrapState::Pre)] {
            let (service, _, queue) = service(state);
            let err = service.sign_metadata(signature()).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!(
                    "It requires bootstrap started. State: {}",
                    state.map_or("None".to_owned(), |s| s.to_string())
                )
            );
            let err = service
                .delete_sign_metadata(DeleteSignMetadata { role: "root".into() })
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Precondition { requires: Requirement::Started, .. }
            ));
            assert!(queue.submitted().is_empty());
        }
    }

    #[tokio::test]
    async fn delete_sign_is_queued() {
        let (service, _, queue) = service(Some(BootstrapState::Signing));
        let submission = service
            .delete_sign_metadata(DeleteSignMetadata { role: "root".into() })
            .await
            .unwrap();
        assert_eq!(submission.message, "Metadata sign delete accepted.");
        let submitted = queue.submitted();
        let request = &submitted[0];
        assert_eq!(request.action, Action::DeleteSignMetadata);
        assert_eq!(request.payload, json!({ "role": "root" }));
    }

    #[tokio::test]
    async fn pending_signing_lists_worker_metadata() {
        let (service, store, _) = service(Some(BootstrapState::Signing));
        assert!(service.pending_signing().await.unwrap().is_empty());

        store.set_pending_signing("root", Some(json!({ "signed": { "version": 1 } })));
        let pending = service.pending_signing().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending["root"]["signed"]["version"], 1);
    }

    #[tokio::test]
    async fn pending_signing_before_bootstrap_started() {
        let (service, _, _) = service(Some(BootstrapState::Pre));
        let err = service.pending_signing().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NothingToSign { state: Some(BootstrapState::Pre) }
        ));
    }
}
