//! Bootstrap coordination.
//!
//! The [`BootstrapCoordinator`] guarantees that at most one bootstrap
//! ceremony is ever in progress across all API instances:
//!
//! ```text
//! absent ──acquire lock──▶ pre ──worker──▶ signing ──worker──▶ finished
//!    ▲                      │                 │
//!    └──── watchdog: failure / timeout ───────┘
//! ```
//!
//! The lock (`pre`) is written with a single compare-and-swap *before* the
//! task is enqueued, so no task id is ever observable without its lock.
//! Every state other than `absent` rejects new attempts.

mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};

pub use watchdog::{WatchdogOutcome, WatchdogRegistry};
use watchdog::Watchdog;

use crate::backend::{StateStore, TaskQueue};
use crate::error::ServiceError;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::types::{self, Action, BootstrapPayload, BootstrapState, TaskId, TaskRequest};

/// Default watchdog timeout when the caller does not provide one.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between two watchdog polls of the task result.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Answer to "can this repository be bootstrapped?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapStatus {
    /// `true` only once the ceremony durably finished.
    pub bootstrap: bool,
    pub state: Option<BootstrapState>,
    pub task_id: Option<TaskId>,
}

impl BootstrapStatus {
    /// `true` when no bootstrap record exists.
    pub fn is_available(&self) -> bool {
        self.state.is_none()
    }

    pub fn message(&self) -> &'static str {
        if self.is_available() {
            "System available for bootstrap."
        } else {
            "System LOCKED for bootstrap."
        }
    }
}

/// Returned once a bootstrap task has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapAccepted {
    pub task_id: TaskId,
    pub last_update: NaiveDateTime,
}

impl BootstrapAccepted {
    pub fn message(&self) -> &'static str {
        "Bootstrap accepted."
    }
}

/// Owns the bootstrap state machine, lock acquisition and the per-submission
/// watchdog.
#[derive(Debug, Clone)]
pub struct BootstrapCoordinator {
    store: Arc<dyn StateStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    poll_interval: Duration,
    watchdogs: Arc<WatchdogRegistry>,
}

impl BootstrapCoordinator {
    pub fn new(store: Arc<dyn StateStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            queue,
            ids: Arc::new(UuidGenerator),
            poll_interval: DEFAULT_POLL_INTERVAL,
            watchdogs: Arc::new(WatchdogRegistry::new()),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Watchdogs spawned by this coordinator.
    pub fn watchdogs(&self) -> &WatchdogRegistry {
        &self.watchdogs
    }

    /// Report the current bootstrap state.
    pub async fn status(&self) -> Result<BootstrapStatus, ServiceError> {
        let status = match self.store.get_bootstrap_record().await? {
            None => BootstrapStatus {
                bootstrap: false,
                state: None,
                task_id: None,
            },
            Some(record) => BootstrapStatus {
                bootstrap: record.state.is_finished(),
                state: Some(record.state),
                task_id: Some(record.task_id),
            },
        };
        Ok(status)
    }

    /// Lock the repository for bootstrap, enqueue the ceremony and start its
    /// watchdog. Returns as soon as the task is queued.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Conflict`] when a record already exists (nothing is
    /// enqueued or written), [`ServiceError::Validation`] for a zero timeout,
    /// [`ServiceError::Backend`] when the store or queue fail.
    pub async fn submit(&self, payload: BootstrapPayload) -> Result<BootstrapAccepted, ServiceError> {
        if payload.timeout == 0 {
            return Err(ServiceError::Validation(
                "timeout must be a positive number of seconds".into(),
            ));
        }
        let timeout = Duration::from_secs(payload.timeout);
        // Everything fallible that does not touch the backends happens
        // before the lock is taken.
        let body = serde_json::to_value(&payload)?;

        if let Some(record) = self.store.get_bootstrap_record().await? {
            return Err(ServiceError::Conflict {
                state: record.state,
            });
        }

        let task_id = self.ids.next_id();
        if !self.store.acquire_bootstrap_lock(&task_id).await? {
            // Another instance won the race between our read and our write.
            let state = self
                .store
                .get_bootstrap_record()
                .await?
                .map_or(BootstrapState::Pre, |r| r.state);
            info!(task_id = %task_id, %state, "bootstrap lock already taken");
            return Err(ServiceError::Conflict { state });
        }

        let request = TaskRequest::new(task_id.clone(), Action::Bootstrap, body);
        if let Err(e) = self.queue.submit(request).await {
            warn!(task_id = %task_id, error = %e, "failed to enqueue bootstrap; releasing lock");
            if let Err(release_err) = self.store.clear_bootstrap_record(&task_id).await {
                warn!(task_id = %task_id, error = %release_err, "failed to release bootstrap lock");
            }
            return Err(e.into());
        }
        info!(task_id = %task_id, timeout_secs = payload.timeout, "bootstrap task sent");

        let watchdog = Watchdog {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            task_id: task_id.clone(),
            timeout,
            poll_interval: self.poll_interval,
        };
        let span = info_span!("bootstrap_watchdog", task_id = %task_id);
        let handle = tokio::spawn(watchdog.run().instrument(span));
        self.watchdogs.insert(task_id.clone(), handle);

        Ok(BootstrapAccepted {
            task_id,
            last_update: types::now(),
        })
    }
}
