//! Process-wide session bookkeeping.
//!
//! One [`SessionManager`] is constructed at startup and passed by reference
//! to whatever drives sessions. Its lifecycle:
//!
//! 1. [`SessionManager::init`] closes out commands a dead process left
//!    RUNNING. Only paths that drive the loop or run commands call it.
//! 2. [`SessionManager::create`] / [`SessionManager::resume`] hand out
//!    sessions.
//! 3. [`SessionManager::begin`] registers a session as driven by this
//!    process and returns a guard carrying its cancellation token; dropping
//!    the guard unregisters it.
//! 4. [`SessionManager::cancel_all`] (e.g. on Ctrl+C) trips every token.

use crate::ports::tool_catalog::ToolCatalogPort;
use crate::use_cases::execution_tracker::{ExecutionTracker, TrackerError};
use crate::use_cases::state_recovery::{LoadedSession, RecoveryError, StateRecovery};
use gauntlet_domain::command::{CommandId, CompletedCommand};
use gauntlet_domain::session::{ResumeContext, Session, SessionId, SessionView};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session {0} is already being driven by this process")]
    AlreadyActive(SessionId),

    #[error("Session {0} is already done and cannot be resumed")]
    AlreadyDone(SessionId),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// A session resumed from storage.
#[derive(Debug)]
pub struct ResumedSession {
    pub session: Session,
    pub context: ResumeContext,
    pub rolled_back_from: Option<String>,
}

pub struct SessionManager {
    recovery: Arc<StateRecovery>,
    tracker: Arc<ExecutionTracker>,
    catalog: Arc<dyn ToolCatalogPort>,
    active: Mutex<HashMap<SessionId, CancellationToken>>,
}

impl SessionManager {
    pub fn new(
        recovery: Arc<StateRecovery>,
        tracker: Arc<ExecutionTracker>,
        catalog: Arc<dyn ToolCatalogPort>,
    ) -> Self {
        Self {
            recovery,
            tracker,
            catalog,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Close out interrupted commands across all sessions.
    pub fn init(&self) -> Result<usize, SessionError> {
        Ok(self.tracker.recover_all()?)
    }

    pub fn tracker(&self) -> &Arc<ExecutionTracker> {
        &self.tracker
    }

    /// Create and persist a new session.
    pub fn create(&self, goal: impl Into<String>) -> Result<Session, SessionError> {
        let mut session = Session::new(goal);
        session.tools_available = self.catalog.availability();
        self.recovery.save(&session)?;
        info!(session_id = %session.id(), goal = %session.goal, "Session created");
        Ok(session)
    }

    pub fn load(&self, id: &SessionId) -> Result<LoadedSession, SessionError> {
        Ok(self.recovery.load(id)?)
    }

    /// Load a session for another run of the loop.
    ///
    /// Refuses sessions that are done. A snapshot that lags the tracker
    /// (e.g. after a rollback) is reconciled with the execution records
    /// before anything is proposed. Tool availability is refreshed from the
    /// catalog, since binaries may have been installed in between.
    pub fn resume(&self, id: &SessionId) -> Result<ResumedSession, SessionError> {
        self.tracker.recover(id.as_str())?;
        let LoadedSession {
            mut session,
            rolled_back_from,
        } = self.recovery.load(id)?;
        if session.is_done() {
            return Err(SessionError::AlreadyDone(id.clone()));
        }

        let records: Vec<_> = self
            .tracker
            .executions(id.as_str())?
            .into_iter()
            .map(|r| r.command)
            .collect();
        let changes = session.reconcile_executions(&records);
        if !changes.is_empty() {
            warn!(
                session_id = %id,
                added = changes.added.len(),
                adopted = changes.adopted.as_ref().map(CommandId::as_str).unwrap_or("-"),
                "Snapshot behind the execution records, reconciled"
            );
            self.recovery.save(&session)?;
        }

        session.tools_available = self.catalog.availability();
        let context = session.resume_context();
        info!(
            session_id = %id,
            phase = %session.phase,
            loop_state = %session.loop_state,
            "Session resumed"
        );
        Ok(ResumedSession {
            session,
            context,
            rolled_back_from,
        })
    }

    pub fn view(&self, id: &SessionId) -> Result<SessionView, SessionError> {
        Ok(self.recovery.load(id)?.session.view())
    }

    /// Views of every stored session, oldest first. Sessions that cannot be
    /// restored are skipped with a warning.
    pub fn list(&self) -> Result<Vec<SessionView>, SessionError> {
        let mut views = Vec::new();
        for id in self.recovery.list()? {
            match self.recovery.load(&id) {
                Ok(loaded) => views.push(loaded.session.view()),
                Err(e) => warn!(session_id = %id, error = %e, "Skipping unreadable session"),
            }
        }
        views.sort_by_key(|v| v.created_at);
        Ok(views)
    }

    /// Run a submitted command on the tracker worker.
    pub async fn run_command(
        &self,
        id: &SessionId,
        command: &CommandId,
    ) -> Result<CompletedCommand, SessionError> {
        Ok(self.tracker.spawn_run(id.as_str(), command).await?)
    }

    /// Register `id` as driven by this process.
    pub fn begin(&self, id: &SessionId) -> Result<ActiveSession<'_>, SessionError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.contains_key(id) {
            return Err(SessionError::AlreadyActive(id.clone()));
        }
        let token = CancellationToken::new();
        active.insert(id.clone(), token.clone());
        Ok(ActiveSession {
            manager: self,
            id: id.clone(),
            token,
        })
    }

    pub fn is_active(&self, id: &SessionId) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains_key(id)
    }

    /// Request cooperative cancellation of every active session.
    pub fn cancel_all(&self) -> usize {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        for (id, token) in active.iter() {
            info!(session_id = %id, "Cancellation requested");
            token.cancel();
        }
        active.len()
    }
}

/// Guard for a session driven by this process.
pub struct ActiveSession<'a> {
    manager: &'a SessionManager,
    id: SessionId,
    token: CancellationToken,
}

impl ActiveSession<'_> {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        let mut active = self
            .manager
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        active.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionParams;
    use crate::ports::storage::ExecutionStore;
    use crate::testing::{FakeBackend, MemoryExecutionStore, MemorySnapshotStore, nmap_catalog};
    use gauntlet_domain::command::{CommandRecord, CommandStatus, FailureReason};
    use gauntlet_domain::session::{LoopState, RedTeamPhase};

    fn manager_with_store() -> (SessionManager, Arc<MemoryExecutionStore>) {
        let recovery = Arc::new(StateRecovery::new(Arc::new(MemorySnapshotStore::default())));
        let store = Arc::new(MemoryExecutionStore::default());
        let tracker = Arc::new(ExecutionTracker::new(
            store.clone(),
            Arc::new(FakeBackend::new()),
            ExecutionParams::default(),
        ));
        let mut catalog = nmap_catalog();
        catalog.set_available("nmap", false);
        (
            SessionManager::new(recovery, tracker, Arc::new(catalog)),
            store,
        )
    }

    fn manager() -> SessionManager {
        manager_with_store().0
    }

    #[test]
    fn test_create_persists_and_lists() {
        let manager = manager();
        let session = manager.create("enumerate 192.168.1.0/24").unwrap();
        assert_eq!(session.tools_available.get("nmap"), Some(&false));

        let views = manager.list().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].session_id, session.id().to_string());
        assert_eq!(manager.view(session.id()).unwrap().goal, session.goal);
    }

    #[test]
    fn test_resume_refuses_done_session() {
        let manager = manager();
        let mut session = manager.create("enumerate 192.168.1.0/24").unwrap();
        session.mark_done("all hosts found");
        manager.recovery.save(&session).unwrap();

        let err = manager.resume(session.id()).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyDone(_)));
    }

    #[tokio::test]
    async fn test_resume_closes_interrupted_command() {
        let (manager, store) = manager_with_store();
        let session = manager.create("enumerate 192.168.1.0/24").unwrap();
        let sid = session.id().as_str();
        let id = manager
            .tracker
            .submit(
                sid,
                CommandRecord::new(
                    CommandId::from_sequence(1),
                    "nmap",
                    "host_discovery",
                    "nmap -sn 192.168.1.0/24",
                    RedTeamPhase::Recon,
                ),
            )
            .await
            .unwrap();
        // Simulate a process that died mid-run.
        let mut record = manager.tracker.record(sid, &id).unwrap();
        record.command.mark_running().unwrap();
        store.update_pending(&record).unwrap();

        let resumed = manager.resume(session.id()).unwrap();
        assert_eq!(resumed.context.goal, session.goal);
        assert_eq!(
            manager.tracker.status(sid, &id).unwrap(),
            CommandStatus::Complete
        );
        let done = manager.tracker.result(sid, &id).unwrap();
        assert_eq!(done.outcome.failure, Some(FailureReason::Interrupted));
    }

    #[tokio::test]
    async fn test_resume_after_rollback_adopts_submitted_command() {
        let snapshots = Arc::new(MemorySnapshotStore::default());
        let recovery = Arc::new(StateRecovery::new(snapshots.clone()));
        let tracker = Arc::new(ExecutionTracker::new(
            Arc::new(MemoryExecutionStore::default()),
            Arc::new(FakeBackend::new()),
            ExecutionParams::default(),
        ));
        let manager = SessionManager::new(recovery.clone(), tracker, Arc::new(nmap_catalog()));

        let mut session = manager.create("enumerate 192.168.1.0/24").unwrap();
        session.set_loop_state(LoopState::Proposing);
        recovery.save(&session).unwrap();

        let id = session.next_command_id();
        let command = CommandRecord::new(
            id.clone(),
            "nmap",
            "host_discovery",
            "nmap -sn 192.168.1.0/24",
            RedTeamPhase::Recon,
        );
        manager
            .tracker
            .submit(session.id().as_str(), command.clone())
            .await
            .unwrap();
        session.add_command(command).unwrap();
        session.pending_command = Some(id.clone());
        session.set_loop_state(LoopState::AwaitingExecution);
        recovery.save(&session).unwrap();
        snapshots.corrupt_current(session.id(), "{\"session_id\": ");

        let resumed = manager.resume(session.id()).unwrap();
        assert!(resumed.rolled_back_from.is_some());
        let mut restored = resumed.session;
        assert_eq!(restored.loop_state, LoopState::AwaitingExecution);
        assert_eq!(restored.pending_command, Some(id.clone()));
        assert!(restored.command(&id).is_some());
        assert_ne!(restored.next_command_id(), id);

        // The reconciled state is what a later resume sees.
        let again = manager.load(session.id()).unwrap();
        assert!(again.rolled_back_from.is_none());
        assert_eq!(again.session.pending_command, Some(id));
    }

    #[test]
    fn test_begin_is_exclusive_and_guard_releases() {
        let manager = manager();
        let id = SessionId::new("session-a");
        {
            let guard = manager.begin(&id).unwrap();
            assert!(manager.is_active(&id));
            assert!(matches!(
                manager.begin(&id),
                Err(SessionError::AlreadyActive(_))
            ));

            assert_eq!(manager.cancel_all(), 1);
            assert!(guard.token().is_cancelled());
        }
        assert!(!manager.is_active(&id));
        assert!(manager.begin(&id).is_ok());
    }
}
