//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`]. All bodies use a `detail` key:
//!
//! | variant          | status | body                                             |
//! |------------------|--------|--------------------------------------------------|
//! | `Conflict`       | 200    | `{"detail": {"error": ..}}`                      |
//! | `Precondition`   | 200    | `{"detail": {"message": "Task not accepted.", "error": ..}}` |
//! | `NothingToSign`  | 200    | `{"detail": {"message": "No metadata pending signing available", "error": ..}}` |
//! | `Validation`     | 422    | `{"detail": ".."}`                               |
//! | `InvalidFields`  | 422    | `{"detail": [{"loc", "msg", "type"}, ..]}`        |
//! | `Backend`        | 500    | generic message                                  |
//! | `Internal`       | 500    | generic message                                  |
//!
//! Conflict and precondition failures are well-formed requests that cannot
//! be acted on, so they are reported with a success status.
//!
//! **Security note:** backend and internal errors are logged with full
//! detail but only a generic message is returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rstuf_core::{BackendError, ServiceError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// One entry of a field-level validation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending field, starting with `"body"`.
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// All errors that can occur in the rstuf-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A bootstrap already exists.
    #[error("{0}")]
    Conflict(String),

    /// Repository changes before bootstrap got far enough.
    #[error("{0}")]
    Precondition(String),

    /// Pending signatures listed before bootstrap started.
    #[error("{0}")]
    NothingToSign(String),

    /// The request could not be parsed or was rejected as a whole.
    #[error("validation error: {0}")]
    Validation(String),

    /// One or more fields failed validation.
    #[error("{} invalid field(s)", .0.len())]
    InvalidFields(Vec<FieldError>),

    /// Propagated from the state store or the task queue.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ServerError::Conflict(m) => (StatusCode::OK, json!({ "error": m })),
            ServerError::Precondition(m) => (
                StatusCode::OK,
                json!({ "message": "Task not accepted.", "error": m }),
            ),
            ServerError::NothingToSign(m) => (
                StatusCode::OK,
                json!({ "message": "No metadata pending signing available", "error": m }),
            ),
            ServerError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, json!(m)),
            ServerError::InvalidFields(fields) => (StatusCode::UNPROCESSABLE_ENTITY, json!(fields)),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Backend(e) => {
                error!(error = %e, "backend error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!("internal server error"),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!("internal server error"),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ServiceError> for ServerError {
    fn from(e: ServiceError) -> Self {
        let message = e.to_string();
        match e {
            ServiceError::Conflict { .. } => ServerError::Conflict(message),
            ServiceError::Precondition { .. } => ServerError::Precondition(message),
            ServiceError::NothingToSign { .. } => ServerError::NothingToSign(message),
            ServiceError::Validation(m) => ServerError::Validation(m),
            ServiceError::Serialization(_) => ServerError::Internal(message),
            ServiceError::Backend(e) => ServerError::Backend(e),
        }
    }
}

impl From<ValidationErrors> for ServerError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        let mut path = vec!["body".to_owned()];
        flatten(&errors, &mut path, &mut fields);
        fields.sort_by(|a, b| a.loc.cmp(&b.loc));
        ServerError::InvalidFields(fields)
    }
}

fn flatten(errors: &ValidationErrors, path: &mut Vec<String>, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        path.push(field.to_string());
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| FieldError {
                    loc: path.clone(),
                    msg: e
                        .message
                        .as_ref()
                        .map_or_else(|| format!("invalid value ({})", e.code), |m| m.to_string()),
                    kind: e.code.to_string(),
                }));
            }
            ValidationErrorsKind::Struct(inner) => flatten(inner, path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    path.push(index.to_string());
                    flatten(inner, path, out);
                    path.pop();
                }
            }
        }
        path.pop();
    }
}
