use axum::Json;
use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "rstuf-server",
    description = "Repository Service for TUF API",
    contact(
        name = "Repository Service for TUF",
        url = "https://github.com/repository-service-tuf"
    )
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}

/// Serve the generated OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
