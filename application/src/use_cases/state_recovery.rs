//! Session snapshots with rollback.
//!
//! Every save first moves the previous document into a bounded ring of
//! backups. Loading validates the current document structurally; if it is
//! unreadable the newest valid backup is restored and the downgrade is
//! recorded in the session's failures. Only when no candidate survives is
//! the error fatal for that session.

use crate::ports::storage::{SnapshotStore, StoreError};
use gauntlet_domain::session::{FailureKind, FailureRecord, Session, SessionId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Backups kept per session unless configured otherwise.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session {session} cannot be restored: {reason}")]
    StateCorruption { session: SessionId, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A session read back from storage.
#[derive(Debug)]
pub struct LoadedSession {
    pub session: Session,
    /// Backup restored because the current document was invalid.
    pub rolled_back_from: Option<String>,
}

pub struct StateRecovery {
    store: Arc<dyn SnapshotStore>,
    retention: usize,
}

impl StateRecovery {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            retention: DEFAULT_BACKUP_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Write `session` as the current document.
    pub fn save(&self, session: &Session) -> Result<(), RecoveryError> {
        let id = session.id();
        let document = serde_json::to_string_pretty(session)
            .map_err(|e| RecoveryError::Serialization(e.to_string()))?;

        if let Some(previous) = self.store.read_current(id)?
            && previous != document
            && self.retention > 0
        {
            self.store.write_backup(id, &previous)?;
            self.prune(id)?;
        }

        self.store.write_current(id, &document)?;
        debug!(
            session_id = %id,
            phase = %session.phase,
            loop_state = %session.loop_state,
            "Session saved"
        );
        Ok(())
    }

    fn prune(&self, id: &SessionId) -> Result<(), RecoveryError> {
        for name in self.store.list_backups(id)?.into_iter().skip(self.retention) {
            self.store.delete_backup(id, &name)?;
        }
        Ok(())
    }

    pub fn load(&self, id: &SessionId) -> Result<LoadedSession, RecoveryError> {
        let current = self.store.read_current(id)?;
        let backups = self.store.list_backups(id)?;
        if current.is_none() && backups.is_empty() {
            return Err(RecoveryError::NotFound(id.clone()));
        }

        let reason = match current {
            Some(document) => match parse(id, &document) {
                Ok(session) => {
                    return Ok(LoadedSession {
                        session,
                        rolled_back_from: None,
                    });
                }
                Err(reason) => reason,
            },
            None => "current snapshot missing".to_string(),
        };
        warn!(session_id = %id, reason = %reason, "Current snapshot invalid, trying backups");

        for name in backups {
            let document = match self.store.read_backup(id, &name) {
                Ok(document) => document,
                Err(e) => {
                    warn!(session_id = %id, backup = %name, error = %e, "Backup unreadable");
                    continue;
                }
            };
            let mut session = match parse(id, &document) {
                Ok(session) => session,
                Err(backup_reason) => {
                    debug!(session_id = %id, backup = %name, reason = %backup_reason, "Skipping invalid backup");
                    continue;
                }
            };

            let phase = session.phase;
            session.push_failure(FailureRecord::new(
                FailureKind::StateRollback,
                phase,
                format!("snapshot rejected ({}); restored backup {}", reason, name),
            ));
            let restored = serde_json::to_string_pretty(&session)
                .map_err(|e| RecoveryError::Serialization(e.to_string()))?;
            self.store.write_current(id, &restored)?;
            info!(session_id = %id, backup = %name, "Session rolled back to backup");

            return Ok(LoadedSession {
                session,
                rolled_back_from: Some(name),
            });
        }

        Err(RecoveryError::StateCorruption {
            session: id.clone(),
            reason,
        })
    }

    pub fn list(&self) -> Result<Vec<SessionId>, RecoveryError> {
        Ok(self.store.list_sessions()?)
    }
}

fn parse(id: &SessionId, document: &str) -> Result<Session, String> {
    let session: Session = serde_json::from_str(document).map_err(|e| e.to_string())?;
    if session.id() != id {
        return Err(format!("document belongs to session {}", session.id()));
    }
    session.validate().map_err(|e| e.to_string())?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySnapshotStore;
    use gauntlet_domain::facts::ObservedFacts;
    use gauntlet_domain::facts::absorb;

    fn recovery(retention: usize) -> (StateRecovery, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::default());
        (
            StateRecovery::new(store.clone()).with_retention(retention),
            store,
        )
    }

    #[test]
    fn test_save_and_load_reproduce_session() {
        let (recovery, _) = recovery(3);
        let mut session = Session::with_id("session-a", "enumerate 192.168.1.0/24");
        absorb(
            &mut session.facts,
            &ObservedFacts::hosts(["192.168.1.1", "192.168.1.10"]),
        );
        session.transition_phase("hosts found");
        recovery.save(&session).unwrap();

        let loaded = recovery.load(session.id()).unwrap();
        assert!(loaded.rolled_back_from.is_none());
        assert_eq!(loaded.session, session);
    }

    #[test]
    fn test_backups_pruned_to_retention() {
        let (recovery, store) = recovery(2);
        let mut session = Session::with_id("session-a", "enumerate 10.0.0.0/24");
        for cycle in 0..5 {
            session.cycle = cycle;
            recovery.save(&session).unwrap();
        }
        assert_eq!(store.backup_count(session.id()), 2);
    }

    #[test]
    fn test_corrupt_current_rolls_back_to_newest_valid_backup() {
        let (recovery, store) = recovery(3);
        let mut session = Session::with_id("session-a", "enumerate 10.0.0.0/24");
        recovery.save(&session).unwrap();
        session.cycle = 4;
        recovery.save(&session).unwrap();
        session.cycle = 5;
        recovery.save(&session).unwrap();
        store.corrupt_current(session.id(), "{\"session_id\": ");

        let loaded = recovery.load(session.id()).unwrap();
        assert!(loaded.rolled_back_from.is_some());
        assert_eq!(loaded.session.cycle, 4);
        let last = loaded.session.failures().last().unwrap();
        assert_eq!(last.kind, FailureKind::StateRollback);

        // The restored state is now current.
        let again = recovery.load(session.id()).unwrap();
        assert!(again.rolled_back_from.is_none());
        assert_eq!(again.session.cycle, 4);
    }

    #[test]
    fn test_structurally_invalid_snapshot_is_rejected() {
        let (recovery, store) = recovery(3);
        let session = Session::with_id("session-a", "enumerate 10.0.0.0/24");
        recovery.save(&session).unwrap();

        let mut broken = session.clone();
        broken.goal = String::new();
        store.corrupt_current(session.id(), &serde_json::to_string(&broken).unwrap());

        // No backup exists yet, so there is nothing to fall back on.
        let err = recovery.load(session.id()).unwrap_err();
        assert!(matches!(err, RecoveryError::StateCorruption { .. }));
    }

    #[test]
    fn test_missing_session_not_found() {
        let (recovery, _) = recovery(3);
        let err = recovery.load(&SessionId::new("session-none")).unwrap_err();
        assert!(matches!(err, RecoveryError::NotFound(_)));
    }

    #[test]
    fn test_list_sessions() {
        let (recovery, _) = recovery(3);
        recovery
            .save(&Session::with_id("session-a", "goal a"))
            .unwrap();
        recovery
            .save(&Session::with_id("session-b", "goal b"))
            .unwrap();
        assert_eq!(
            recovery.list().unwrap(),
            vec![SessionId::new("session-a"), SessionId::new("session-b")]
        );
    }
}
