//! File-backed implementations of the storage ports.
//!
//! Both stores share one root, one directory per session:
//!
//! ```text
//! <data_dir>/agents/<session_id>/
//!   state.json
//!   backups/state-000001.json
//!   executions/pending/<command_id>.json
//!   executions/complete/<command_id>.json
//!   events.jsonl
//! ```
//!
//! Every document is written to a temp file and renamed into place.

mod execution_store;
pub(crate) mod fs;
mod snapshot_store;

pub use execution_store::FileExecutionStore;
pub use snapshot_store::FileSnapshotStore;

use std::path::{Path, PathBuf};

/// Directory holding every session under `data_dir`.
pub fn sessions_root(data_dir: &Path) -> PathBuf {
    data_dir.join("agents")
}
