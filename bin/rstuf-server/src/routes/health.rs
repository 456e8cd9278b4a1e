//! Readiness endpoint.
//!
//! Answers `200` only when the shared state store can be read, since every
//! API operation starts there. The bootstrap state is reported alongside.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// `{"status": "ok", "version": .., "bootstrap": ..}` while the state store
/// answers, `503` with `{"status": "unavailable"}` otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is ready", body = Value),
        (status = 503, description = "State store unreachable", body = Value),
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.coordinator.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "bootstrap": status.state.map(|s| s.to_string()),
            })),
        ),
        Err(e) => {
            warn!(error = %e, "state store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};
    use rstuf_core::backend::StateStore;
    use rstuf_core::backend::memory::{MemoryStateStore, MemoryTaskQueue};
    use rstuf_core::error::BackendError;
    use rstuf_core::types::{BootstrapRecord, BootstrapState};
    use serde_json::Value;

    use crate::config::Config;
    use crate::routes::testing::{app, send};
    use crate::state::AppState;

    /// Store whose every call fails, as when the database is gone.
    #[derive(Debug)]
    struct BrokenStore;

    fn down() -> BackendError {
        BackendError::Store("connection refused".into())
    }

    #[async_trait]
    impl StateStore for BrokenStore {
        async fn get_bootstrap_record(&self) -> Result<Option<BootstrapRecord>, BackendError> {
            Err(down())
        }

        async fn acquire_bootstrap_lock(&self, _: &str) -> Result<bool, BackendError> {
            Err(down())
        }

        async fn set_bootstrap_state(
            &self,
            _: &str,
            _: BootstrapState,
        ) -> Result<bool, BackendError> {
            Err(down())
        }

        async fn clear_bootstrap_record(&self, _: &str) -> Result<bool, BackendError> {
            Err(down())
        }

        async fn pending_signing(&self) -> Result<BTreeMap<String, Value>, BackendError> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn ready_with_reachable_store() {
        let test = app(MemoryStateStore::new());
        let (status, body) = send(&test.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
        assert_eq!(body["bootstrap"], Value::Null);
    }

    #[tokio::test]
    async fn reports_bootstrap_state() {
        let test = app(MemoryStateStore::with_record(BootstrapRecord {
            task_id: "t1".into(),
            state: BootstrapState::Signing,
        }));
        let (status, body) = send(&test.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bootstrap"], "signing");
    }

    #[tokio::test]
    async fn unavailable_when_store_fails() {
        let state = AppState::new(
            Config::default(),
            Arc::new(BrokenStore),
            Arc::new(MemoryTaskQueue::new()),
        );
        let router = crate::routes::build(Arc::new(state));
        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
    }
}
