//! Durable storage ports
//!
//! Two stores back a session:
//!
//! - [`SnapshotStore`]: the current session document plus a ring of backups
//! - [`ExecutionStore`]: execution records, partitioned into pending and
//!   complete
//!
//! ```text
//! <data_dir>/agents/<session_id>/
//!   state.json
//!   backups/state-000001.json ...
//!   executions/pending/<command_id>.json
//!   executions/complete/<command_id>.json
//! ```
//!
//! The layout is an infrastructure detail; the ports only fix the logical
//! shape the resume path relies on.

use gauntlet_domain::command::{CommandId, ExecutionRecord};
use gauntlet_domain::session::SessionId;
use thiserror::Error;

/// Errors raised by storage adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already complete: {0}")]
    AlreadyComplete(String),
}

impl StoreError {
    pub fn io(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// Session snapshots and their backups.
///
/// Documents are opaque strings here; parsing and structural validation are
/// the recovery use case's job, so a corrupt document can still be read.
pub trait SnapshotStore: Send + Sync {
    /// Atomically replace the current document.
    fn write_current(&self, session: &SessionId, document: &str) -> Result<(), StoreError>;

    fn read_current(&self, session: &SessionId) -> Result<Option<String>, StoreError>;

    /// Store a backup; returns its name.
    fn write_backup(&self, session: &SessionId, document: &str) -> Result<String, StoreError>;

    /// Backup names, newest first.
    fn list_backups(&self, session: &SessionId) -> Result<Vec<String>, StoreError>;

    fn read_backup(&self, session: &SessionId, name: &str) -> Result<String, StoreError>;

    fn delete_backup(&self, session: &SessionId, name: &str) -> Result<(), StoreError>;

    /// Sessions that have a current document or backups.
    fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError>;
}

/// Execution records, keyed by (session, command id).
///
/// A record lives in exactly one partition. `complete` must make the
/// complete copy durable before removing the pending one.
pub trait ExecutionStore: Send + Sync {
    /// Store a new record in the pending partition.
    fn insert_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Overwrite a record in the pending partition (e.g. PENDING → RUNNING).
    fn update_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Move a record to the complete partition.
    ///
    /// A complete record is never replaced: if one exists the call fails with
    /// [`StoreError::AlreadyComplete`] after dropping any pending copy.
    fn complete(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Look up a record in either partition.
    fn get(&self, session: &str, id: &CommandId) -> Result<Option<ExecutionRecord>, StoreError>;

    fn list_pending(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError>;

    fn list_complete(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Sessions that have any execution record.
    fn sessions(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every record of a session.
    fn remove_session(&self, session: &str) -> Result<usize, StoreError>;
}
