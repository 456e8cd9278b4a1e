//! Bootstrap endpoints.
//!
//! A repository is bootstrapped exactly once. `POST` locks the system and
//! returns as soon as the ceremony task is queued; progress is followed with
//! `GET /api/v1/task` and `GET /api/v1/bootstrap`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ValidatedJson;
use crate::schemas::v1::bootstrap::{
    BootstrapBody, BootstrapGetData, BootstrapGetResponse, BootstrapPostData,
    BootstrapPostResponse, RootMetadataBody, ServiceSettingsBody, SettingsBody, Signature,
    TufMetadata,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_bootstrap, post_bootstrap),
    components(schemas(
        BootstrapBody,
        SettingsBody,
        ServiceSettingsBody,
        RootMetadataBody,
        TufMetadata,
        Signature,
        BootstrapGetData,
        BootstrapGetResponse,
        BootstrapPostData,
        BootstrapPostResponse
    ))
)]
pub struct BootstrapApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/bootstrap", get(get_bootstrap).post(post_bootstrap))
}

#[utoipa::path(
    get,
    path = "/api/v1/bootstrap",
    tag = "bootstrap",
    responses(
        (status = 200, description = "Bootstrap state", body = BootstrapGetResponse),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn get_bootstrap(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BootstrapGetResponse>, ServerError> {
    let status = state.coordinator.status().await?;
    Ok(Json(status.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/bootstrap",
    tag = "bootstrap",
    request_body = BootstrapBody,
    responses(
        (status = 202, description = "Bootstrap accepted", body = BootstrapPostResponse),
        (status = 200, description = "System already has a Metadata"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn post_bootstrap(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<BootstrapBody>,
) -> Result<(StatusCode, Json<BootstrapPostResponse>), ServerError> {
    let payload = body
        .into_payload()
        .map_err(|e| ServerError::Internal(format!("bootstrap payload encoding failed: {e}")))?;
    let accepted = state.coordinator.submit(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted.into())))
}

#[cfg(test)]
mod test {
    use axum::http::{Method, StatusCode};
    use rstuf_core::backend::StateStore;
    use rstuf_core::backend::memory::MemoryStateStore;
    use rstuf_core::types::{Action, BootstrapRecord, BootstrapState, QueueName};
    use serde_json::json;

    use crate::routes::testing::{app, send};
    use crate::schemas::v1::bootstrap::test::payload;

    const URL: &str = "/api/v1/bootstrap";

    fn locked(state: BootstrapState) -> MemoryStateStore {
        MemoryStateStore::with_record(BootstrapRecord {
            task_id: "task_id".into(),
            state,
        })
    }

    #[tokio::test]
    async fn get_available() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "data": { "bootstrap": false }, "message": "System available for bootstrap." })
        );
    }

    #[tokio::test]
    async fn get_in_progress() {
        for (state, name) in [(BootstrapState::Pre, "pre"), (BootstrapState::Signing, "signing")] {
            let test = app(locked(state));
            let (status, body) = send(&test.router, Method::GET, URL, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({
                    "data": { "bootstrap": false, "state": name, "id": "task_id" },
                    "message": "System LOCKED for bootstrap.",
                })
            );
        }
    }

    #[tokio::test]
    async fn get_finished() {
        let test = app(locked(BootstrapState::Finished));
        let (_, body) = send(&test.router, Method::GET, URL, None).await;
        assert_eq!(
            body,
            json!({
                "data": { "bootstrap": true, "state": "finished", "id": "task_id" },
                "message": "System LOCKED for bootstrap.",
            })
        );
    }

    #[tokio::test]
    async fn post_accepted() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::POST, URL, Some(payload())).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["message"], "Bootstrap accepted.");
        let task_id = body["data"]["task_id"].as_str().unwrap();
        assert_eq!(task_id.len(), 32);
        assert!(body["data"]["last_update"].is_string());

        let record = test.store.get_bootstrap_record().await.unwrap();
        assert_eq!(record, Some(BootstrapRecord::pre(task_id)));
        let submitted = test.queue.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].action, Action::Bootstrap);
        assert_eq!(submitted[0].queue, QueueName::MetadataRepository);
        assert_eq!(submitted[0].payload["timeout"], 300);
    }

    #[tokio::test]
    async fn post_custom_timeout() {
        let test = app(MemoryStateStore::new());
        let mut body = payload();
        body["timeout"] = json!(600);
        let (status, _) = send(&test.router, Method::POST, URL, Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(test.queue.submitted()[0].payload["timeout"], 600);
    }

    #[tokio::test]
    async fn post_already_bootstrapped() {
        for (state, name) in [
            (BootstrapState::Pre, "pre"),
            (BootstrapState::Signing, "signing"),
            (BootstrapState::Finished, "finished"),
        ] {
            let test = app(locked(state));
            let (status, body) = send(&test.router, Method::POST, URL, Some(payload())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({ "detail": { "error": format!("System already has a Metadata. State: {name}") } })
            );
            assert!(test.queue.submitted().is_empty());
        }
    }

    #[tokio::test]
    async fn post_unrecognized_field() {
        let test = app(MemoryStateStore::new());
        let mut body = payload();
        body["metadata"]["root"]["signed"]["x-url"] = json!("http://example.com");
        let (status, body) = send(&test.router, Method::POST, URL, Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["detail"][0]["msg"],
            "unrecognized_field must use format x-<vendor>-<name>"
        );
        assert!(test.queue.submitted().is_empty());
    }

    #[tokio::test]
    async fn post_vendor_field_accepted() {
        let test = app(MemoryStateStore::new());
        let mut body = payload();
        body["metadata"]["root"]["signed"]["x-v-n-url"] = json!("http://url.com");
        let (status, _) = send(&test.router, Method::POST, URL, Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn post_empty_payload() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::POST, URL, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("settings"));
        assert!(test.store.get_bootstrap_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn post_zero_timeout() {
        let test = app(MemoryStateStore::new());
        let mut body = payload();
        body["timeout"] = json!(0);
        let (status, body) = send(&test.router, Method::POST, URL, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "timeout"]));
    }
}
