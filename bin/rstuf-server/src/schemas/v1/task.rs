use rstuf_core::TaskStatusView;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct TaskQuery {
    /// Id returned when the task was submitted.
    pub task_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskData {
    pub task_id: String,
    /// Queue state, or `ERRORED` for a task that finished with a failed outcome.
    pub state: String,
    pub result: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub data: TaskData,
    pub message: String,
}

impl From<TaskStatusView> for TaskResponse {
    fn from(view: TaskStatusView) -> Self {
        Self {
            data: TaskData {
                task_id: view.task_id,
                state: view.state.to_string(),
                result: view.result,
            },
            message: "Task state.".to_owned(),
        }
    }
}
