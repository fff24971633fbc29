//! File-backed session snapshots.
//!
//! ```text
//! <root>/<session_id>/state.json
//! <root>/<session_id>/backups/state-000001.json
//! ```
//!
//! A new backup is numbered after the newest one on disk, so lexical order
//! of the names is age order.

use super::fs::{
    json_stems, list_entries, path_component, read_optional, remove_if_exists, write_atomic,
};
use gauntlet_application::{SnapshotStore, StoreError};
use gauntlet_domain::session::SessionId;
use std::path::{Path, PathBuf};
use tracing::debug;

const CURRENT_FILE: &str = "state.json";
const BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "state-";

pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Store rooted at `root` (normally `<data_dir>/agents`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(path_component(session.as_str())?))
    }

    fn backup_dir(&self, session: &SessionId) -> Result<PathBuf, StoreError> {
        Ok(self.session_dir(session)?.join(BACKUP_DIR))
    }

    fn backup_path(&self, session: &SessionId, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .backup_dir(session)?
            .join(format!("{}.json", path_component(name)?)))
    }

    /// Backup names, oldest first.
    fn backups_ascending(&self, session: &SessionId) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = json_stems(&self.backup_dir(session)?)?
            .into_iter()
            .filter(|n| n.starts_with(BACKUP_PREFIX))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn write_current(&self, session: &SessionId, document: &str) -> Result<(), StoreError> {
        let path = self.session_dir(session)?.join(CURRENT_FILE);
        write_atomic(&path, document)?;
        debug!(session_id = %session, path = %path.display(), "Snapshot written");
        Ok(())
    }

    fn read_current(&self, session: &SessionId) -> Result<Option<String>, StoreError> {
        read_optional(&self.session_dir(session)?.join(CURRENT_FILE))
    }

    fn write_backup(&self, session: &SessionId, document: &str) -> Result<String, StoreError> {
        let next = self
            .backups_ascending(session)?
            .last()
            .and_then(|n| n.trim_start_matches(BACKUP_PREFIX).parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let name = format!("{}{:06}", BACKUP_PREFIX, next);
        write_atomic(&self.backup_path(session, &name)?, document)?;
        Ok(name)
    }

    fn list_backups(&self, session: &SessionId) -> Result<Vec<String>, StoreError> {
        let mut names = self.backups_ascending(session)?;
        names.reverse();
        Ok(names)
    }

    fn read_backup(&self, session: &SessionId, name: &str) -> Result<String, StoreError> {
        read_optional(&self.backup_path(session, name)?)?
            .ok_or_else(|| StoreError::NotFound(format!("backup {} of {}", name, session)))
    }

    fn delete_backup(&self, session: &SessionId, name: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.backup_path(session, name)?)?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let dirs = list_entries(&self.root, |p| {
            p.is_dir() && (p.join(CURRENT_FILE).is_file() || p.join(BACKUP_DIR).is_dir())
        })?;
        Ok(dirs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(SessionId::new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileSnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("agents"));
        (dir, store)
    }

    #[test]
    fn test_current_document_replaced() {
        let (_dir, store) = store();
        let id = SessionId::new("session-a");
        assert_eq!(store.read_current(&id).unwrap(), None);

        store.write_current(&id, "{\"n\":1}").unwrap();
        store.write_current(&id, "{\"n\":2}").unwrap();

        assert_eq!(store.read_current(&id).unwrap().as_deref(), Some("{\"n\":2}"));
        assert!(store.root().join("session-a").join("state.json").is_file());
    }

    #[test]
    fn test_backups_are_numbered_and_listed_newest_first() {
        let (_dir, store) = store();
        let id = SessionId::new("session-a");

        assert_eq!(store.write_backup(&id, "one").unwrap(), "state-000001");
        assert_eq!(store.write_backup(&id, "two").unwrap(), "state-000002");
        assert_eq!(store.write_backup(&id, "three").unwrap(), "state-000003");

        assert_eq!(
            store.list_backups(&id).unwrap(),
            vec!["state-000003", "state-000002", "state-000001"]
        );
        assert_eq!(store.read_backup(&id, "state-000002").unwrap(), "two");

        store.delete_backup(&id, "state-000003").unwrap();
        // Numbering continues from the newest remaining backup.
        assert_eq!(store.write_backup(&id, "four").unwrap(), "state-000003");
        assert!(matches!(
            store.read_backup(&id, "state-000009"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sessions_only_counts_session_dirs() {
        let (_dir, store) = store();
        store.write_current(&SessionId::new("session-b"), "{}").unwrap();
        store.write_backup(&SessionId::new("session-a"), "{}").unwrap();
        std::fs::create_dir_all(store.root().join("stray")).unwrap();

        let ids: Vec<String> = store
            .list_sessions()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ids, vec!["session-a", "session-b"]);
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, store) = store();
        assert!(store.write_current(&SessionId::new(".."), "{}").is_err());
        assert!(store.read_backup(&SessionId::new("session-a"), "../x").is_err());
    }
}
