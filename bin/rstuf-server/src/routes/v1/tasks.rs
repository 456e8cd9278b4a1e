//! Task status endpoint.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::task::{TaskData, TaskQuery, TaskResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_task), components(schemas(TaskData, TaskResponse)))]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/task", get(get_task))
}

#[utoipa::path(
    get,
    path = "/api/v1/task",
    tag = "tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Task state", body = TaskResponse),
        (status = 422, description = "Missing or malformed task_id"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> Result<Json<TaskResponse>, ServerError> {
    let Query(q) = query.map_err(|rejection| ServerError::Validation(rejection.body_text()))?;
    let view = state.translator.status(&q.task_id).await?;
    Ok(Json(view.into()))
}

#[cfg(test)]
mod test {
    use axum::http::{Method, StatusCode};
    use rstuf_core::backend::memory::MemoryStateStore;
    use rstuf_core::types::{TaskResult, TaskState};
    use serde_json::json;

    use crate::routes::testing::{app, send};

    const URL: &str = "/api/v1/task?task_id=test_id";

    #[tokio::test]
    async fn success() {
        let test = app(MemoryStateStore::new());
        let result = json!({
            "status": true,
            "task": "add_artifacts",
            "last_update": "2023-11-17T09:54:15.762882",
            "message": "Artifact(s) Added",
            "details": {
                "added_artifacts": ["file1.tar.gz", "file2.tar.gz", "file3.tar.gz"],
                "invalid_paths": [],
                "target_roles": ["bins-3", "bins-2"]
            }
        });
        test.queue
            .set_result("test_id", TaskResult::new(TaskState::Success, result.clone()));

        let (status, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "data": { "task_id": "test_id", "state": "SUCCESS", "result": result },
                "message": "Task state.",
            })
        );
    }

    #[tokio::test]
    async fn raised_error() {
        let test = app(MemoryStateStore::new());
        test.queue.set_result(
            "test_id",
            TaskResult::new(
                TaskState::Failure,
                json!({ "exc_type": "ValueError", "exc_message": ["Failed to load"] }),
            ),
        );

        let (_, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(
            body["data"],
            json!({ "task_id": "test_id", "state": "FAILURE", "result": { "message": "Failed to load" } })
        );
    }

    #[tokio::test]
    async fn errored() {
        let test = app(MemoryStateStore::new());
        let result = json!({
            "status": false,
            "task": "sign_metadata",
            "last_update": "2023-11-17T09:54:15.762882",
            "message": "Signature Failed",
            "error": "No signatures pending for root"
        });
        test.queue
            .set_result("test_id", TaskResult::new(TaskState::Success, result.clone()));

        let (_, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(body["data"]["state"], "ERRORED");
        assert_eq!(body["data"]["result"], result);
    }

    #[tokio::test]
    async fn success_with_empty_result() {
        let test = app(MemoryStateStore::new());
        test.queue
            .set_result("test_id", TaskResult::new(TaskState::Success, json!({})));

        let (_, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(body["data"]["state"], "ERRORED");
        assert_eq!(body["data"]["result"], json!({}));
    }

    #[tokio::test]
    async fn missing_task_id_is_unprocessable() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::GET, "/api/v1/task", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("task_id"));
    }

    #[tokio::test]
    async fn unknown_task_is_pending() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "PENDING");
        assert_eq!(body["data"]["result"], json!(null));
    }
}
