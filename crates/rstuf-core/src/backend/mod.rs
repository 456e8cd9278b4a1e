//! Ports to the external collaborators: the shared state store holding the
//! bootstrap record, and the task queue feeding the repository worker.
//!
//! Both traits are object-safe so the coordinator and services can hold
//! `Arc<dyn StateStore>` / `Arc<dyn TaskQueue>` and be handed any backend.
//! [`memory`] provides in-process implementations.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendError;
use crate::types::{BootstrapRecord, BootstrapState, TaskRequest, TaskResult};

/// Key-value store shared by every API instance and the worker.
///
/// All mutating operations must be atomic with respect to each other across
/// processes.
#[async_trait]
pub trait StateStore: Debug + Send + Sync + 'static {
    /// Read the bootstrap record; `None` means bootstrap is available.
    async fn get_bootstrap_record(&self) -> Result<Option<BootstrapRecord>, BackendError>;

    /// Atomically write `{task_id, state: pre}` if no record exists.
    ///
    /// Returns `false` when a record already exists, in which case nothing
    /// is written.
    async fn acquire_bootstrap_lock(&self, task_id: &str) -> Result<bool, BackendError>;

    /// Advance the state of the record owned by `task_id`.
    ///
    /// Returns `false` when no record exists or it belongs to another task.
    async fn set_bootstrap_state(
        &self,
        task_id: &str,
        state: BootstrapState,
    ) -> Result<bool, BackendError>;

    /// Atomically delete the record if it still belongs to `task_id`.
    ///
    /// Returns `false` when there was nothing of ours to delete.
    async fn clear_bootstrap_record(&self, task_id: &str) -> Result<bool, BackendError>;

    /// Role metadata the worker left waiting for more signatures, keyed by
    /// role name. Written by the worker only.
    async fn pending_signing(&self) -> Result<BTreeMap<String, Value>, BackendError>;
}

/// Queue delivering [`TaskRequest`]s to the repository worker.
#[async_trait]
pub trait TaskQueue: Debug + Send + Sync + 'static {
    /// Enqueue a request. Task ids must be unique.
    async fn submit(&self, request: TaskRequest) -> Result<(), BackendError>;

    /// Current state and raw result. Unknown ids report `PENDING` with no
    /// result.
    async fn get_result(&self, task_id: &str) -> Result<TaskResult, BackendError>;

    /// Best-effort revocation of a task that has not finished. With
    /// `terminate`, a worker already executing the task is asked to kill it.
    async fn cancel(&self, task_id: &str, terminate: bool) -> Result<(), BackendError>;
}
