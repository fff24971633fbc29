//! File-backed execution records.
//!
//! ```text
//! <root>/<session_id>/executions/pending/<command_id>.json
//! <root>/<session_id>/executions/complete/<command_id>.json
//! ```
//!
//! Completing a record writes the complete copy before removing the pending
//! one. A crash in between leaves both files; the complete copy wins and the
//! stale pending file is dropped the next time the partition is listed.

use super::fs::{
    json_stems, list_entries, path_component, read_optional, remove_if_exists, write_atomic,
};
use gauntlet_application::{ExecutionStore, StoreError};
use gauntlet_domain::command::{CommandId, ExecutionRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXECUTIONS_DIR: &str = "executions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Pending,
    Complete,
}

impl Partition {
    fn dir_name(self) -> &'static str {
        match self {
            Partition::Pending => "pending",
            Partition::Complete => "complete",
        }
    }
}

pub struct FileExecutionStore {
    root: PathBuf,
}

impl FileExecutionStore {
    /// Store rooted at `root` (normally `<data_dir>/agents`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn executions_dir(&self, session: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(path_component(session)?).join(EXECUTIONS_DIR))
    }

    fn partition_dir(&self, session: &str, partition: Partition) -> Result<PathBuf, StoreError> {
        Ok(self.executions_dir(session)?.join(partition.dir_name()))
    }

    fn record_path(
        &self,
        session: &str,
        id: &CommandId,
        partition: Partition,
    ) -> Result<PathBuf, StoreError> {
        Ok(self
            .partition_dir(session, partition)?
            .join(format!("{}.json", path_component(id.as_str())?)))
    }

    fn write(&self, record: &ExecutionRecord, partition: Partition) -> Result<(), StoreError> {
        let path = self.record_path(&record.session_id, record.id(), partition)?;
        let document = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&path, &document)
    }

    fn read(path: &Path) -> Result<Option<ExecutionRecord>, StoreError> {
        match read_optional(path)? {
            Some(document) => serde_json::from_str(&document)
                .map(Some)
                .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e))),
            None => Ok(None),
        }
    }

    fn list(&self, session: &str, partition: Partition) -> Result<Vec<ExecutionRecord>, StoreError> {
        let dir = self.partition_dir(session, partition)?;
        let mut records = Vec::new();
        for stem in json_stems(&dir)? {
            let id = CommandId::new(stem);
            if partition == Partition::Pending
                && self.record_path(session, &id, Partition::Complete)?.is_file()
            {
                debug!(session_id = session, command_id = %id, "Dropping stale pending copy");
                remove_if_exists(&self.record_path(session, &id, Partition::Pending)?)?;
                continue;
            }
            match Self::read(&dir.join(format!("{}.json", id)))? {
                Some(record) => records.push(record),
                None => warn!(session_id = session, command_id = %id, "Record vanished while listing"),
            }
        }
        Ok(records)
    }
}

impl ExecutionStore for FileExecutionStore {
    fn insert_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.write(record, Partition::Pending)
    }

    fn update_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.session_id, record.id(), Partition::Pending)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(format!(
                "pending record {} of {}",
                record.id(),
                record.session_id
            )));
        }
        self.write(record, Partition::Pending)
    }

    fn complete(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let complete = self.record_path(&record.session_id, record.id(), Partition::Complete)?;
        let pending = self.record_path(&record.session_id, record.id(), Partition::Pending)?;
        if complete.is_file() {
            remove_if_exists(&pending)?;
            return Err(StoreError::AlreadyComplete(format!(
                "{} of {}",
                record.id(),
                record.session_id
            )));
        }
        self.write(record, Partition::Complete)?;
        remove_if_exists(&pending)?;
        Ok(())
    }

    fn get(&self, session: &str, id: &CommandId) -> Result<Option<ExecutionRecord>, StoreError> {
        if let Some(record) = Self::read(&self.record_path(session, id, Partition::Complete)?)? {
            return Ok(Some(record));
        }
        Self::read(&self.record_path(session, id, Partition::Pending)?)
    }

    fn list_pending(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.list(session, Partition::Pending)
    }

    fn list_complete(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.list(session, Partition::Complete)
    }

    fn sessions(&self) -> Result<Vec<String>, StoreError> {
        let dirs = list_entries(&self.root, |p| p.join(EXECUTIONS_DIR).is_dir())?;
        Ok(dirs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(str::to_string)
            .collect())
    }

    fn remove_session(&self, session: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for partition in [Partition::Pending, Partition::Complete] {
            let dir = self.partition_dir(session, partition)?;
            for stem in json_stems(&dir)? {
                if remove_if_exists(&dir.join(format!("{}.json", stem)))? {
                    removed += 1;
                }
            }
        }
        let dir = self.executions_dir(session)?;
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(dir.display(), e))?;
        }
        Ok(removed)
    }
}
