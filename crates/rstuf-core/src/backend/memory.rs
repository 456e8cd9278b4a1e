//! In-process implementations of [`StateStore`] and [`TaskQueue`].
//!
//! Both are guarded by a `std::sync::Mutex` that is never held across an
//! `.await`, which makes every operation atomic within the process.
//! [`MemoryTaskQueue`] also exposes worker-side hooks so tests can drive a
//! task through its lifecycle.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{StateStore, TaskQueue};
use crate::error::BackendError;
use crate::types::{BootstrapRecord, BootstrapState, TaskId, TaskRequest, TaskResult, TaskState};

// ── State store ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    record: Mutex<Option<BootstrapRecord>>,
    signing: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `record`.
    pub fn with_record(record: BootstrapRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            signing: Mutex::default(),
        }
    }

    /// Worker-side hook: store (`Some`) or drop (`None`) the metadata of
    /// `role` awaiting signatures.
    pub fn set_pending_signing(&self, role: &str, metadata: Option<Value>) {
        if let Ok(mut signing) = self.signing.lock() {
            match metadata {
                Some(metadata) => {
                    signing.insert(role.to_owned(), metadata);
                }
                None => {
                    signing.remove(role);
                }
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<BootstrapRecord>>, BackendError> {
        self.record
            .lock()
            .map_err(|_| BackendError::Store("bootstrap record mutex poisoned".into()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_bootstrap_record(&self) -> Result<Option<BootstrapRecord>, BackendError> {
        Ok(self.lock()?.clone())
    }

    async fn acquire_bootstrap_lock(&self, task_id: &str) -> Result<bool, BackendError> {
        let mut record = self.lock()?;
        if record.is_some() {
            return Ok(false);
        }
        *record = Some(BootstrapRecord::pre(task_id));
        Ok(true)
    }

    async fn set_bootstrap_state(
        &self,
        task_id: &str,
        state: BootstrapState,
    ) -> Result<bool, BackendError> {
        let mut record = self.lock()?;
        match record.as_mut() {
            Some(r) if r.task_id == task_id => {
                r.state = state;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_bootstrap_record(&self, task_id: &str) -> Result<bool, BackendError> {
        let mut record = self.lock()?;
        match record.as_ref() {
            Some(r) if r.task_id == task_id => {
                *record = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_signing(&self) -> Result<BTreeMap<String, Value>, BackendError> {
        self.signing
            .lock()
            .map(|signing| signing.clone())
            .map_err(|_| BackendError::Store("signing mutex poisoned".into()))
    }
}

// ── Task queue ────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct QueueEntry {
    request: Option<TaskRequest>,
    result: TaskResult,
}

#[derive(Debug, Default)]
struct QueueInner {
    entries: HashMap<TaskId, QueueEntry>,
    /// Submission order.
    order: Vec<TaskId>,
    /// `(task_id, terminate)` for every cancel call.
    cancelled: Vec<(TaskId, bool)>,
}

#[derive(Debug, Default)]
pub struct MemoryTaskQueue {
    inner: Mutex<QueueInner>,
    reject_submissions: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, QueueInner>, BackendError> {
        self.inner
            .lock()
            .map_err(|_| BackendError::Queue("queue mutex poisoned".into()))
    }

    /// Make every subsequent `submit` fail, simulating an unreachable broker.
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    /// Make every subsequent `get_result` fail, simulating a result backend
    /// that cannot be reached.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    // ── worker-side hooks ─────────────────────────────────────────────────────

    /// Mark a task as picked up by a worker.
    pub fn start(&self, task_id: &str) {
        self.set_result(task_id, TaskResult::new(TaskState::Started, Value::Null));
    }

    /// Record a worker result. Works for ids never submitted through this
    /// queue as well.
    pub fn set_result(&self, task_id: &str, result: TaskResult) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .entries
                .entry(task_id.to_owned())
                .and_modify(|e| e.result = result.clone())
                .or_insert(QueueEntry {
                    request: None,
                    result,
                });
        }
    }

    // ── inspection ────────────────────────────────────────────────────────────

    /// Requests in submission order.
    pub fn submitted(&self) -> Vec<TaskRequest> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id)?.request.clone())
            .collect()
    }

    pub fn cancelled(&self) -> Vec<(TaskId, bool)> {
        self.inner
            .lock()
            .map(|inner| inner.cancelled.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn submit(&self, request: TaskRequest) -> Result<(), BackendError> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(BackendError::Queue("broker unavailable".into()));
        }
        let mut inner = self.lock()?;
        if inner
            .entries
            .get(&request.task_id)
            .is_some_and(|e| e.request.is_some())
        {
            return Err(BackendError::DuplicateTask {
                task_id: request.task_id,
            });
        }
        let task_id = request.task_id.clone();
        inner.order.push(task_id.clone());
        inner
            .entries
            .entry(task_id)
            .and_modify(|e| e.request = Some(request.clone()))
            .or_insert(QueueEntry {
                request: Some(request),
                result: TaskResult::pending(),
            });
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<TaskResult, BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Queue("result backend unavailable".into()));
        }
        let inner = self.lock()?;
        Ok(inner
            .entries
            .get(task_id)
            .map(|e| e.result.clone())
            .unwrap_or_else(TaskResult::pending))
    }

    async fn cancel(&self, task_id: &str, terminate: bool) -> Result<(), BackendError> {
        let mut inner = self.lock()?;
        inner.cancelled.push((task_id.to_owned(), terminate));
        if let Some(entry) = inner.entries.get_mut(task_id) {
            if !entry.result.state.is_terminal() {
                entry.result = TaskResult::new(TaskState::Revoked, Value::Null);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Action;
    use serde_json::json;

    #[tokio::test]
    async fn lock_is_acquired_once() {
        let store = MemoryStateStore::new();
        assert!(store.acquire_bootstrap_lock("a").await.unwrap());
        assert!(!store.acquire_bootstrap_lock("b").await.unwrap());
        let record = store.get_bootstrap_record().await.unwrap();
        assert_eq!(record, Some(BootstrapRecord::pre("a")));
    }

    #[tokio::test]
    async fn clear_only_removes_own_record() {
        let store = MemoryStateStore::new();
        store.acquire_bootstrap_lock("a").await.unwrap();
        assert!(!store.clear_bootstrap_record("b").await.unwrap());
        assert!(store.get_bootstrap_record().await.unwrap().is_some());
        assert!(store.clear_bootstrap_record("a").await.unwrap());
        assert!(store.get_bootstrap_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn state_advances_for_owner_only() {
        let store = MemoryStateStore::new();
        store.acquire_bootstrap_lock("a").await.unwrap();
        assert!(!store.set_bootstrap_state("b", BootstrapState::Signing).await.unwrap());
        assert!(store.set_bootstrap_state("a", BootstrapState::Signing).await.unwrap());
        let record = store.get_bootstrap_record().await.unwrap().unwrap();
        assert_eq!(record.state, BootstrapState::Signing);
    }

    #[tokio::test]
    async fn pending_signing_follows_worker_writes() {
        let store = MemoryStateStore::new();
        assert!(store.pending_signing().await.unwrap().is_empty());

        store.set_pending_signing("root", Some(json!({ "signed": { "version": 2 } })));
        let pending = store.pending_signing().await.unwrap();
        assert_eq!(pending["root"]["signed"]["version"], 2);

        store.set_pending_signing("root", None);
        assert!(store.pending_signing().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_reads_can_be_simulated() {
        let queue = MemoryTaskQueue::new();
        queue.fail_reads(true);
        assert!(matches!(
            queue.get_result("t1").await,
            Err(BackendError::Queue(_))
        ));
        queue.fail_reads(false);
        assert_eq!(queue.get_result("t1").await.unwrap(), TaskResult::pending());
    }

    #[tokio::test]
    async fn unknown_task_is_pending() {
        let queue = MemoryTaskQueue::new();
        let result = queue.get_result("nope").await.unwrap();
        assert_eq!(result, TaskResult::pending());
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let queue = MemoryTaskQueue::new();
        let req = TaskRequest::new("t1", Action::PublishTargets, Value::Null);
        queue.submit(req.clone()).await.unwrap();
        let err = queue.submit(req).await.unwrap_err();
        assert!(matches!(err, BackendError::DuplicateTask { .. }));
        assert_eq!(queue.submitted().len(), 1);
    }

    #[tokio::test]
    async fn cancel_revokes_unfinished_task_only() {
        let queue = MemoryTaskQueue::new();
        queue
            .submit(TaskRequest::new("t1", Action::Bootstrap, Value::Null))
            .await
            .unwrap();
        queue.set_result("t2", TaskResult::new(TaskState::Success, json!({ "status": true })));

        queue.cancel("t1", true).await.unwrap();
        queue.cancel("t2", true).await.unwrap();

        assert_eq!(queue.get_result("t1").await.unwrap().state, TaskState::Revoked);
        assert_eq!(queue.get_result("t2").await.unwrap().state, TaskState::Success);
        assert_eq!(
            queue.cancelled(),
            vec![("t1".to_owned(), true), ("t2".to_owned(), true)]
        );
    }
}
