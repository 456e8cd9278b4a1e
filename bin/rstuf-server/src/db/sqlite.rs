//! SQLite implementation of the state store and the task queue.
//!
//! Migrations under `./migrations` are embedded at compile time and run by
//! [`SqliteStore::connect`].
//!
//! The bootstrap lock relies on the `bootstrap` table's primary key being
//! pinned to `1`: acquisition is a single `INSERT .. ON CONFLICT DO NOTHING`
//! and release a `DELETE` filtered on the owning task id.
//!
//! The `sqlx::query` (runtime-verified) form is used so that no
//! `DATABASE_URL` is needed at compile time.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use rstuf_core::backend::{StateStore, TaskQueue};
use rstuf_core::types::{self, BootstrapRecord, BootstrapState, TaskRequest, TaskResult, TaskState};
use rstuf_core::BackendError;
use serde_json::Value;
use sqlx::SqlitePool;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run pending migrations.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running pending migrations on it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn store_err(e: sqlx::Error) -> BackendError {
    BackendError::Store(e.to_string())
}

fn queue_err(e: sqlx::Error) -> BackendError {
    BackendError::Queue(e.to_string())
}

fn timestamp() -> String {
    types::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

// ── StateStore ────────────────────────────────────────────────────────────────

#[async_trait]
impl StateStore for SqliteStore {
    async fn get_bootstrap_record(&self) -> Result<Option<BootstrapRecord>, BackendError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT task_id, state FROM bootstrap WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        row.map(|(task_id, state)| -> Result<BootstrapRecord, BackendError> {
            let state = BootstrapState::from_str(&state)
                .map_err(|_| BackendError::Corrupt(format!("unknown bootstrap state '{state}'")))?;
            Ok(BootstrapRecord { task_id, state })
        })
        .transpose()
    }

    async fn acquire_bootstrap_lock(&self, task_id: &str) -> Result<bool, BackendError> {
        let done = sqlx::query(
            "INSERT INTO bootstrap (id, task_id, state, updated_at) VALUES (1, ?1, ?2, ?3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(task_id)
        .bind(BootstrapState::Pre.to_string())
        .bind(timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn set_bootstrap_state(
        &self,
        task_id: &str,
        state: BootstrapState,
    ) -> Result<bool, BackendError> {
        let done = sqlx::query(
            "UPDATE bootstrap SET state = ?1, updated_at = ?2 WHERE id = 1 AND task_id = ?3",
        )
        .bind(state.to_string())
        .bind(timestamp())
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn clear_bootstrap_record(&self, task_id: &str) -> Result<bool, BackendError> {
        let done = sqlx::query("DELETE FROM bootstrap WHERE id = 1 AND task_id = ?1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn pending_signing(&self) -> Result<BTreeMap<String, Value>, BackendError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT role, metadata FROM signing ORDER BY role")
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

        rows.into_iter()
            .map(|(role, raw)| -> Result<(String, Value), BackendError> {
                let metadata = serde_json::from_str(&raw).map_err(|e| {
                    BackendError::Corrupt(format!("pending metadata for '{role}' is not JSON: {e}"))
                })?;
                Ok((role, metadata))
            })
            .collect()
    }
}

// ── TaskQueue ─────────────────────────────────────────────────────────────────

#[async_trait]
impl TaskQueue for SqliteStore {
    async fn submit(&self, request: TaskRequest) -> Result<(), BackendError> {
        let payload = serde_json::to_string(&request.payload)
            .map_err(|e| BackendError::Queue(format!("payload encoding failed: {e}")))?;
        let now = timestamp();
        let done = sqlx::query(
            "INSERT INTO task_queue \
             (task_id, queue_name, action, payload, ack_mode, state, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             ON CONFLICT (task_id) DO NOTHING",
        )
        .bind(&request.task_id)
        .bind(request.queue.to_string())
        .bind(request.action.to_string())
        .bind(payload)
        .bind(request.ack_mode.to_string())
        .bind(TaskState::Pending.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;

        if done.rows_affected() == 0 {
            return Err(BackendError::DuplicateTask {
                task_id: request.task_id,
            });
        }
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<TaskResult, BackendError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT state, result FROM task_queue WHERE task_id = ?1")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(queue_err)?;

        let Some((state, result)) = row else {
            return Ok(TaskResult::pending());
        };
        let state = TaskState::from(state);
        let result = match result {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| BackendError::Corrupt(format!("task result is not JSON: {e}")))?,
            None => serde_json::Value::Null,
        };
        Ok(TaskResult::new(state, result))
    }

    async fn cancel(&self, task_id: &str, terminate: bool) -> Result<(), BackendError> {
        sqlx::query(
            "UPDATE task_queue SET state = ?1, terminate = ?2, updated_at = ?3 \
             WHERE task_id = ?4 AND state NOT IN ('SUCCESS', 'FAILURE', 'REVOKED')",
        )
        .bind(TaskState::Revoked.to_string())
        .bind(terminate)
        .bind(timestamp())
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;
        Ok(())
    }
}
