//! Metadata rotation and offline signing endpoints.
//!
//! Rotation requires a finished bootstrap. Listing pending metadata, adding a
//! signature and discarding a signing round also work while the bootstrap
//! waits in `signing`. Submissions return `202` once the task is queued.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ValidatedJson;
use crate::schemas::v1::metadata::{
    MetadataPostBody, MetadataPostData, MetadataPostResponse, MetadataSignBody,
    MetadataSignData, MetadataSignDeleteBody, MetadataSignGetResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(post_metadata, get_metadata_sign, post_metadata_sign, post_metadata_sign_delete),
    components(schemas(
        MetadataPostBody,
        MetadataSignBody,
        MetadataSignDeleteBody,
        MetadataPostData,
        MetadataPostResponse,
        MetadataSignData,
        MetadataSignGetResponse
    ))
)]
pub struct MetadataApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metadata", post(post_metadata))
        .route("/metadata/sign", get(get_metadata_sign).post(post_metadata_sign))
        .route("/metadata/sign/delete", post(post_metadata_sign_delete))
}

#[utoipa::path(
    post,
    path = "/api/v1/metadata",
    tag = "metadata",
    request_body = MetadataPostBody,
    responses(
        (status = 202, description = "Metadata update accepted", body = MetadataPostResponse),
        (status = 200, description = "Task not accepted: bootstrap not finished"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn post_metadata(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<MetadataPostBody>,
) -> Result<(StatusCode, Json<MetadataPostResponse>), ServerError> {
    let update = body
        .into_update()
        .map_err(|e| ServerError::Internal(format!("metadata payload encoding failed: {e}")))?;
    let submission = state.submissions.update_metadata(update).await?;
    info!(task_id = %submission.task_id, "metadata rotation accepted");
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/metadata/sign",
    tag = "metadata",
    responses(
        (status = 200, description = "Metadata pending signatures", body = MetadataSignGetResponse),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn get_metadata_sign(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetadataSignGetResponse>, ServerError> {
    let pending = state.submissions.pending_signing().await?;
    Ok(Json(pending.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/metadata/sign",
    tag = "metadata",
    request_body = MetadataSignBody,
    responses(
        (status = 202, description = "Metadata sign accepted", body = MetadataPostResponse),
        (status = 200, description = "Task not accepted: bootstrap not started"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn post_metadata_sign(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<MetadataSignBody>,
) -> Result<(StatusCode, Json<MetadataPostResponse>), ServerError> {
    let role = body.role.clone();
    let submission = state.submissions.sign_metadata(body.into()).await?;
    info!(task_id = %submission.task_id, %role, "metadata signature accepted");
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/metadata/sign/delete",
    tag = "metadata",
    request_body = MetadataSignDeleteBody,
    responses(
        (status = 202, description = "Metadata sign delete accepted", body = MetadataPostResponse),
        (status = 200, description = "Task not accepted: bootstrap not started"),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Backend error"),
    )
)]
pub async fn post_metadata_sign_delete(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<MetadataSignDeleteBody>,
) -> Result<(StatusCode, Json<MetadataPostResponse>), ServerError> {
    let submission = state.submissions.delete_sign_metadata(body.into()).await?;
    Ok((StatusCode::ACCEPTED, Json(submission.into())))
}
