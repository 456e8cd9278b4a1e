//! Artifact submission endpoints.
//!
//! Add and delete require a finished bootstrap; publish is always accepted.
//! All three return `202` once the task is queued.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ValidatedJson;
use crate::schemas::v1::artifacts::{
    AddArtifactsBody, ArtifactBody, ArtifactInfoBody, ArtifactsData, ArtifactsResponse,
    DeleteArtifactsBody,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(add_artifacts, delete_artifacts, publish_artifacts),
    components(schemas(
        AddArtifactsBody,
        ArtifactBody,
        ArtifactInfoBody,
        DeleteArtifactsBody,
        ArtifactsData,
        ArtifactsResponse
    ))
)]
pub struct ArtifactsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/artifacts", post(add_artifacts).delete(delete_artifacts))
        .route("/artifacts/publish", post(publish_artifacts))
}

#[utoipa::path(
    post,
    path = "/api/v1/artifacts",
    tag = "artifacts",
    request_body = AddArtifactsBody,
    responses(
        (status = 202, description = "Artifacts submitted", body = ArtifactsResponse),
        (status = 200, description = "Task not accepted: bootstrap not finished"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn add_artifacts(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<AddArtifactsBody>,
) -> Result<(StatusCode, Json<ArtifactsResponse>), ServerError> {
    let count = body.targets.len();
    let submission = state.submissions.add(body.into()).await?;
    info!(task_id = %submission.task_id, count, "artifact addition accepted");
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/artifacts",
    tag = "artifacts",
    request_body = DeleteArtifactsBody,
    responses(
        (status = 202, description = "Artifact removal submitted", body = ArtifactsResponse),
        (status = 200, description = "Task not accepted: bootstrap not finished"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn delete_artifacts(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<DeleteArtifactsBody>,
) -> Result<(StatusCode, Json<ArtifactsResponse>), ServerError> {
    let count = body.targets.len();
    let submission = state.submissions.remove(body.into()).await?;
    info!(task_id = %submission.task_id, count, "artifact removal accepted");
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/artifacts/publish",
    tag = "artifacts",
    responses(
        (status = 202, description = "Publish submitted", body = ArtifactsResponse),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn publish_artifacts(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ArtifactsResponse>), ServerError> {
    let submission = state.submissions.publish().await?;
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}
