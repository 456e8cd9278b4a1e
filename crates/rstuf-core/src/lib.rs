//! Control-plane core of the Repository Service for TUF.
//!
//! * [`bootstrap`] – one-time bootstrap lock, state machine and watchdog.
//! * [`targets`] – artifact add / remove / publish submission.
//! * [`metadata`] – metadata rotation and offline signing submission.
//! * [`tasks`] – task status lookup and normalization.
//! * [`backend`] – the shared state store and task queue ports.

pub mod backend;
pub mod bootstrap;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod targets;
pub mod tasks;
pub mod types;

pub use bootstrap::{BootstrapAccepted, BootstrapCoordinator, BootstrapStatus};
pub use error::{BackendError, Requirement, ServiceError};
pub use metadata::{
    DeleteSignMetadata, MetadataSignature, MetadataSubmission, MetadataUpdate, SignMetadata,
};
pub use targets::{AddArtifacts, RemoveArtifacts, Submission, TaskSubmissionService};
pub use tasks::{TaskStatusTranslator, TaskStatusView};
pub use types::{BootstrapPayload, BootstrapRecord, BootstrapState, TaskId, TaskResult, TaskState};
