//! Task status lookup.
//!
//! The queue's `SUCCESS` only means the worker function returned without
//! raising. The translator reads the worker's own outcome flag to tell a
//! business success apart from a logical failure (`ERRORED`).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::TaskQueue;
use crate::error::ServiceError;
use crate::types::{RawResult, TaskId, TaskResult, TaskState};

/// Client-facing view of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub state: TaskState,
    pub result: Value,
}

#[derive(Debug, Clone)]
pub struct TaskStatusTranslator {
    queue: Arc<dyn TaskQueue>,
}

impl TaskStatusTranslator {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Read and normalize the state of `task_id`. Unknown ids are reported
    /// as `PENDING` by the queue.
    pub async fn status(&self, task_id: &str) -> Result<TaskStatusView, ServiceError> {
        let raw = self.queue.get_result(task_id).await?;
        let raw_state = raw.state.clone();
        let (state, result) = normalize(raw);
        debug!(task_id, %raw_state, %state, "task status read");
        Ok(TaskStatusView {
            task_id: task_id.to_owned(),
            state,
            result,
        })
    }
}

/// Map a raw queue result to the client-facing state and result.
///
/// * `SUCCESS` stays `SUCCESS` only for a structured outcome with
///   `status: true` and no `error`; anything else becomes `ERRORED`.
/// * `FAILURE` stays `FAILURE`; a raised error becomes `{"message": ..}`.
/// * Every other state is passed through with its result untouched.
pub fn normalize(raw: TaskResult) -> (TaskState, Value) {
    match raw.state {
        TaskState::Success => match RawResult::decode(raw.result) {
            Some(RawResult::Structured(map)) if is_business_success(&map) => {
                (TaskState::Success, Value::Object(map))
            }
            decoded => (TaskState::Errored, decoded_or_empty(decoded)),
        },
        TaskState::Failure => (TaskState::Failure, decoded_or_empty(RawResult::decode(raw.result))),
        state => (state, raw.result),
    }
}

fn is_business_success(map: &Map<String, Value>) -> bool {
    let status = map.get("status").and_then(Value::as_bool).unwrap_or(false);
    let error = map.get("error").is_some_and(|e| !e.is_null());
    status && !error
}

fn decoded_or_empty(decoded: Option<RawResult>) -> Value {
    decoded.map_or_else(|| Value::Object(Map::new()), RawResult::into_value)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    use crate::backend::memory::MemoryTaskQueue;

    fn translator(task_id: &str, result: TaskResult) -> TaskStatusTranslator {
        let queue = MemoryTaskQueue::new();
        queue.set_result(task_id, result);
        TaskStatusTranslator::new(Arc::new(queue))
    }

    #[tokio::test]
    async fn structured_success_is_success() {
        let result = json!({
            "status": true,
            "task": "add_artifacts",
            "last_update": "2023-11-17T09:54:15.762882",
            "message": "Artifact(s) Added",
            "details": {
                "added_artifacts": ["file1.tar.gz", "file2.tar.gz", "file3.tar.gz"],
                "invalid_paths": [],
                "target_roles": ["bins-3", "bins-2"],
            },
        });
        let view = translator("test_id", TaskResult::new(TaskState::Success, result.clone()))
            .status("test_id")
            .await
            .unwrap();
        assert_eq!(view.task_id, "test_id");
        assert_eq!(view.state, TaskState::Success);
        assert_eq!(view.result, result);
    }

    #[tokio::test]
    async fn raised_error_becomes_message() {
        let raw = TaskResult::new(
            TaskState::Failure,
            json!({ "exc_type": "ValueError", "exc_message": ["Failed to load"] }),
        );
        let view = translator("test_id", raw).status("test_id").await.unwrap();
        assert_eq!(view.state, TaskState::Failure);
        assert_eq!(view.result, json!({ "message": "Failed to load" }));
    }

    #[tokio::test]
    async fn logical_failure_is_errored() {
        let result = json!({
            "status": false,
            "task": "sign_metadata",
            "last_update": "2023-11-17T09:54:15.762882",
            "message": "Signature Failed",
            "error": "No signatures pending for root",
        });
        let view = translator("test_id", TaskResult::new(TaskState::Success, result.clone()))
            .status("test_id")
            .await
            .unwrap();
        assert_eq!(view.state, TaskState::Errored);
        assert_eq!(view.result, result);
    }

    #[test]
    fn empty_success_is_errored() {
        assert_eq!(
            normalize(TaskResult::new(TaskState::Success, json!({}))),
            (TaskState::Errored, json!({}))
        );
        assert_eq!(
            normalize(TaskResult::new(TaskState::Success, Value::Null)),
            (TaskState::Errored, json!({}))
        );
    }

    #[test]
    fn success_with_error_field_is_errored() {
        let result = json!({ "status": true, "error": "partial" });
        assert_eq!(
            normalize(TaskResult::new(TaskState::Success, result.clone())),
            (TaskState::Errored, result)
        );
    }

    #[test]
    fn failure_without_result_is_still_failure() {
        assert_eq!(
            normalize(TaskResult::new(TaskState::Failure, Value::Null)),
            (TaskState::Failure, json!({}))
        );
        assert_eq!(
            normalize(TaskResult::new(TaskState::Failure, json!("worker lost"))),
            (TaskState::Failure, json!({ "message": "worker lost" }))
        );
    }

    #[test]
    fn other_states_pass_through() {
        assert_eq!(
            normalize(TaskResult::pending()),
            (TaskState::Pending, Value::Null)
        );
        let progress = json!({ "current": 3, "total": 10 });
        assert_eq!(
            normalize(TaskResult::new(TaskState::Started, progress.clone())),
            (TaskState::Started, progress)
        );
    }

    #[tokio::test]
    async fn unlisted_worker_state_is_reported_as_is() {
        let running = TaskState::Other("RUNNING".into());
        let translator = translator("t1", TaskResult::new(running.clone(), Value::Null));
        let view = translator.status("t1").await.unwrap();
        assert_eq!(view.state, running);
        assert_eq!(view.result, Value::Null);
        assert_eq!(serde_json::to_value(&view).unwrap()["state"], "RUNNING");
    }

    #[tokio::test]
    async fn unknown_task_is_pending() {
        let translator = TaskStatusTranslator::new(Arc::new(MemoryTaskQueue::new()));
        let view = translator.status("nope").await.unwrap();
        assert_eq!(view.state, TaskState::Pending);
        assert_eq!(view.result, Value::Null);
    }

    #[tokio::test]
    async fn repeated_lookups_are_identical() {
        let translator = translator(
            "t1",
            TaskResult::new(TaskState::Success, json!({ "status": false })),
        );
        let first = translator.status("t1").await.unwrap();
        let second = translator.status("t1").await.unwrap();
        assert_eq!(first, second);
    }
}
