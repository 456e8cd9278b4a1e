//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use rstuf_core::backend::{StateStore, TaskQueue};
use rstuf_core::{BootstrapCoordinator, TaskStatusTranslator, TaskSubmissionService};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Bootstrap lock, state machine and watchdogs.
    pub coordinator: BootstrapCoordinator,
    /// Artifact and metadata submissions.
    pub submissions: TaskSubmissionService,
    pub translator: TaskStatusTranslator,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn StateStore>, queue: Arc<dyn TaskQueue>) -> Self {
        let coordinator = BootstrapCoordinator::new(Arc::clone(&store), Arc::clone(&queue))
            .with_poll_interval(config.watchdog_poll_interval);
        let submissions = TaskSubmissionService::new(store, Arc::clone(&queue));
        let translator = TaskStatusTranslator::new(queue);
        Self {
            config: Arc::new(config),
            coordinator,
            submissions,
            translator,
        }
    }
}
