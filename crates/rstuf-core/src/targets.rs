//! Artifact submission: add, remove and publish.
//!
//! Add and remove are gated on a finished bootstrap; publish is always
//! accepted. Each call generates one task id and performs exactly one
//! enqueue, then returns without waiting for the worker.
//!
//! Metadata rotation and signing go through the same service; see
//! [`crate::metadata`].

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::backend::{StateStore, TaskQueue};
use crate::error::{Requirement, ServiceError};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::types::{self, Action, Artifact, TaskId, TaskRequest};

/// Custom-metadata key used to stamp artifacts with their task id.
pub const TASK_ID_CUSTOM_KEY: &str = "added_by_task_id";

const PUBLISH_SKIPPED: &str = " Publishing will be skipped.";

fn default_true() -> bool {
    true
}

/// Payload of an add request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddArtifacts {
    pub targets: Vec<Artifact>,
    #[serde(default)]
    pub add_task_id_to_custom: bool,
    #[serde(default = "default_true")]
    pub publish_targets: bool,
}

/// Payload of a remove request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveArtifacts {
    pub targets: Vec<String>,
    #[serde(default = "default_true")]
    pub publish_targets: bool,
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Submitted artifact paths; empty for publish.
    pub targets: Vec<String>,
    pub task_id: TaskId,
    pub last_update: NaiveDateTime,
    #[serde(skip)]
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TaskSubmissionService {
    store: Arc<dyn StateStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskSubmissionService {
    pub fn new(store: Arc<dyn StateStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            queue,
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Queue new artifacts, optionally stamping each with the task id.
    pub async fn add(&self, mut request: AddArtifacts) -> Result<Submission, ServiceError> {
        self.require_bootstrap(Requirement::Finished).await?;

        let task_id = self.next_task_id();
        if request.add_task_id_to_custom {
            for artifact in &mut request.targets {
                stamp_task_id(&mut artifact.info.custom, &task_id);
            }
        }

        let targets = request.targets.iter().map(|a| a.path.clone()).collect();
        let publish = request.publish_targets;
        self.enqueue(&task_id, Action::AddTargets, serde_json::to_value(&request)?)
            .await?;

        Ok(Submission {
            targets,
            task_id,
            last_update: types::now(),
            message: with_publish_note("New Artifact(s) successfully submitted.", publish),
        })
    }

    /// Queue removal of artifacts by path.
    pub async fn remove(&self, request: RemoveArtifacts) -> Result<Submission, ServiceError> {
        self.require_bootstrap(Requirement::Finished).await?;

        let task_id = self.next_task_id();
        self.enqueue(&task_id, Action::RemoveTargets, serde_json::to_value(&request)?)
            .await?;

        Ok(Submission {
            message: with_publish_note(
                "Remove Artifact(s) successfully submitted.",
                request.publish_targets,
            ),
            targets: request.targets,
            task_id,
            last_update: types::now(),
        })
    }

    /// Ask the worker to publish pending artifact changes.
    pub async fn publish(&self) -> Result<Submission, ServiceError> {
        let task_id = self.next_task_id();
        self.enqueue(&task_id, Action::PublishTargets, Value::Null).await?;

        Ok(Submission {
            targets: Vec::new(),
            task_id,
            last_update: types::now(),
            message: "Publish targets successfully submitted.".to_owned(),
        })
    }

    pub(crate) fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        self.ids.next_id()
    }

    pub(crate) async fn require_bootstrap(&self, requires: Requirement) -> Result<(), ServiceError> {
        let record = self.store.get_bootstrap_record().await?;
        let satisfied = record.as_ref().is_some_and(|r| match requires {
            Requirement::Finished => r.state.is_finished(),
            Requirement::Started => r.state.accepts_signatures(),
        });
        if satisfied {
            return Ok(());
        }
        Err(ServiceError::Precondition {
            requires,
            state: record.map(|r| r.state),
        })
    }

    pub(crate) async fn enqueue(
        &self,
        task_id: &str,
        action: Action,
        payload: Value,
    ) -> Result<(), ServiceError> {
        let request = TaskRequest::new(task_id, action, payload);
        let queue = request.queue;
        self.queue.submit(request).await?;
        info!(task_id, %action, %queue, "task submitted");
        Ok(())
    }
}

/// Add `added_by_task_id` to `custom`, keeping every existing key.
fn stamp_task_id(custom: &mut Option<Map<String, Value>>, task_id: &str) {
    custom
        .get_or_insert_with(Map::new)
        .entry(TASK_ID_CUSTOM_KEY)
        .or_insert_with(|| Value::String(task_id.to_owned()));
}

fn with_publish_note(message: &str, publish: bool) -> String {
    if publish {
        message.to_owned()
    } else {
        format!("{message}{PUBLISH_SKIPPED}")
    }
}
