//! Post-submission monitor for bootstrap tasks.
//!
//! One watchdog is spawned per accepted bootstrap. It polls the queue for the
//! task's result and reconciles the bootstrap lock with the outcome:
//!
//! | observed                 | action                                   |
//! |--------------------------|------------------------------------------|
//! | `SUCCESS`                | exit; the worker advances to `finished`  |
//! | `FAILURE` / `REVOKED`    | release the lock                         |
//! | deadline passed          | cancel (terminate) the task, release     |
//! | other state, read error  | keep polling                             |
//!
//! The watchdog communicates only through the state store; nobody awaits
//! its outcome on the request path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backend::{StateStore, TaskQueue};
use crate::types::{TaskId, TaskState};

/// How a watchdog finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The task succeeded; the lock was left in place.
    Succeeded,
    /// The task failed or was revoked; the lock was released.
    Failed,
    /// No terminal result before the deadline; the task was cancelled and
    /// the lock released.
    TimedOut,
}

#[derive(Debug)]
pub(crate) struct Watchdog {
    pub store: Arc<dyn StateStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub task_id: TaskId,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Watchdog {
    pub async fn run(self) -> WatchdogOutcome {
        let deadline = Instant::now() + self.timeout;

        loop {
            match self.queue.get_result(&self.task_id).await {
                Ok(result) => match &result.state {
                    TaskState::Success => {
                        info!(task_id = %self.task_id, "bootstrap task succeeded; watchdog exiting");
                        return WatchdogOutcome::Succeeded;
                    }
                    TaskState::Failure | TaskState::Revoked => {
                        warn!(
                            task_id = %self.task_id,
                            state = %result.state,
                            "bootstrap task failed; releasing bootstrap lock"
                        );
                        self.release().await;
                        return WatchdogOutcome::Failed;
                    }
                    state => debug!(task_id = %self.task_id, %state, "bootstrap task in progress"),
                },
                Err(e) => {
                    warn!(task_id = %self.task_id, error = %e, "failed to read bootstrap task result");
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    task_id = %self.task_id,
                    timeout_secs = self.timeout.as_secs(),
                    "bootstrap task timed out; cancelling"
                );
                if let Err(e) = self.queue.cancel(&self.task_id, true).await {
                    warn!(task_id = %self.task_id, error = %e, "failed to cancel bootstrap task");
                }
                self.release().await;
                return WatchdogOutcome::TimedOut;
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn release(&self) {
        match self.store.clear_bootstrap_record(&self.task_id).await {
            Ok(true) => info!(task_id = %self.task_id, "bootstrap lock released"),
            Ok(false) => warn!(
                task_id = %self.task_id,
                "bootstrap lock no longer held by this task; nothing released"
            ),
            Err(e) => error!(task_id = %self.task_id, error = %e, "failed to release bootstrap lock"),
        }
    }
}

/// Join handles of spawned watchdogs, keyed by bootstrap task id.
pub struct WatchdogRegistry {
    handles: Mutex<HashMap<TaskId, JoinHandle<WatchdogOutcome>>>,
}

impl std::fmt::Debug for WatchdogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WatchdogRegistry({} in flight)", self.in_flight())
    }
}

impl Default for WatchdogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogRegistry {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Track a new watchdog, dropping the handles of those that already
    /// exited.
    pub(crate) fn insert(&self, id: impl Into<TaskId>, handle: JoinHandle<WatchdogOutcome>) {
        if let Ok(mut map) = self.handles.lock() {
            map.retain(|_, h| !h.is_finished());
            map.insert(id.into(), handle);
        }
    }

    /// Number of watchdogs still running.
    pub fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .map(|map| map.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for the watchdog of `task_id` to exit and return its outcome.
    /// Returns `None` for unknown ids, a watchdog that panicked, or one
    /// already pruned by a later [`insert`](Self::insert).
    pub async fn wait(&self, task_id: &str) -> Option<WatchdogOutcome> {
        let handle = self.handles.lock().ok()?.remove(task_id)?;
        handle.await.ok()
    }
}
