pub mod artifacts;
pub mod bootstrap;
pub mod metadata;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/api/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(bootstrap::router())
        .merge(artifacts::router())
        .merge(metadata::router())
        .merge(tasks::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = V1Api::openapi();
    spec.merge(bootstrap::BootstrapApi::openapi());
    spec.merge(artifacts::ArtifactsApi::openapi());
    spec.merge(metadata::MetadataApi::openapi());
    spec.merge(tasks::TasksApi::openapi());
    spec
}
