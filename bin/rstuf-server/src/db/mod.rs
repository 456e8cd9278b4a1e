//! Persistence layer.
//!
//! [`sqlite::SqliteStore`] implements both ports of `rstuf-core`
//! ([`rstuf_core::backend::StateStore`] and
//! [`rstuf_core::backend::TaskQueue`]) on one SQLite database shared by all
//! API instances and the repository worker. To move to another database,
//! implement the two traits for a new type and pass it to
//! [`crate::state::AppState::new`].

pub mod sqlite;
