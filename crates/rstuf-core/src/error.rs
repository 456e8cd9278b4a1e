use strum::Display;
use thiserror::Error;

use crate::types::{BootstrapState, TaskId};

/// Bootstrap progress a request depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Requirement {
    /// The ceremony completed.
    Finished,
    /// The root metadata exists (`signing` or `finished`).
    Started,
}

/// Failures reported by the external state store and task queue.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The shared state store could not be read or written.
    #[error("state store error: {0}")]
    Store(String),

    /// The task queue rejected or failed a request.
    #[error("task queue error: {0}")]
    Queue(String),

    /// A task with the same id has already been submitted.
    #[error("duplicate task id: {task_id}")]
    DuplicateTask { task_id: TaskId },

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors returned by the coordinator and the submission service.
///
/// `Conflict` and `Precondition` are business-rule outcomes for well-formed
/// requests; they are detected before anything is enqueued.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A bootstrap is already in progress or finished.
    #[error("System already has a Metadata. State: {state}")]
    Conflict { state: BootstrapState },

    /// A repository change was requested before bootstrap got far enough.
    #[error("It requires bootstrap {requires}. State: {}", state_label(.state))]
    Precondition {
        requires: Requirement,
        state: Option<BootstrapState>,
    },

    /// Pending signatures were listed before any root metadata existed.
    #[error("It requires bootstrap started. State: {}", state_label(.state))]
    NothingToSign { state: Option<BootstrapState> },

    /// The request itself is malformed.
    #[error("{0}")]
    Validation(String),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn state_label(state: &Option<BootstrapState>) -> String {
    state.map_or_else(|| "None".to_owned(), |s| s.to_string())
}
