//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `RSTUF_ENABLE_DOCS=false`)
//! - Health / heartbeat route
//! - `/api/v1` routes

pub mod doc;
mod health;
mod v1;

use std::sync::Arc;

use axum::routing::get;
use axum::{Router, middleware};

use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api/v1", v1::router());

    if state.config.enable_docs {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state.config))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
