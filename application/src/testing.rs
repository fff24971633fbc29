//! In-memory port fakes shared by the use case tests.

use crate::ports::command_backend::{BackendError, CommandBackend, ProcessOutput};
use crate::ports::oracle::OraclePort;
use crate::ports::storage::{ExecutionStore, SnapshotStore, StoreError};
use async_trait::async_trait;
use gauntlet_domain::command::{CommandId, CommandStatus, ExecutionRecord};
use gauntlet_domain::oracle::{
    ObserveDecision, OracleCall, OracleContext, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision,
};
use gauntlet_domain::session::{RedTeamPhase, SessionId};
use gauntlet_domain::tool::{IntentTemplate, ToolCatalog, ToolCategory, ToolDescriptor};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ==================== Stores ====================

#[derive(Default)]
pub(crate) struct MemorySnapshotStore {
    sessions: Mutex<BTreeMap<String, SnapshotSlot>>,
}

#[derive(Default)]
struct SnapshotSlot {
    current: Option<String>,
    /// Oldest first.
    backups: Vec<(String, String)>,
    next_backup: u64,
}

impl MemorySnapshotStore {
    /// Overwrite the current document without touching backups.
    pub(crate) fn corrupt_current(&self, session: &SessionId, document: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.entry(session.to_string()).or_default().current = Some(document.to_string());
    }

    pub(crate) fn backup_count(&self, session: &SessionId) -> usize {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(session.as_str())
            .map(|s| s.backups.len())
            .unwrap_or(0)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn write_current(&self, session: &SessionId, document: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.entry(session.to_string()).or_default().current = Some(document.to_string());
        Ok(())
    }

    fn read_current(&self, session: &SessionId) -> Result<Option<String>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.get(session.as_str()).and_then(|s| s.current.clone()))
    }

    fn write_backup(&self, session: &SessionId, document: &str) -> Result<String, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let slot = sessions.entry(session.to_string()).or_default();
        slot.next_backup += 1;
        let name = format!("state-{:06}", slot.next_backup);
        slot.backups.push((name.clone(), document.to_string()));
        Ok(name)
    }

    fn list_backups(&self, session: &SessionId) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(session.as_str())
            .map(|s| s.backups.iter().rev().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default())
    }

    fn read_backup(&self, session: &SessionId, name: &str) -> Result<String, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(session.as_str())
            .and_then(|s| s.backups.iter().find(|(n, _)| n == name))
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn delete_backup(&self, session: &SessionId, name: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(slot) = sessions.get_mut(session.as_str()) {
            slot.backups.retain(|(n, _)| n != name);
        }
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.keys().map(SessionId::new).collect())
    }
}

#[derive(Default)]
pub(crate) struct MemoryExecutionStore {
    /// (session, command id) → (complete?, record)
    records: Mutex<BTreeMap<(String, String), (bool, ExecutionRecord)>>,
}

impl MemoryExecutionStore {
    fn key(session: &str, id: &CommandId) -> (String, String) {
        (session.to_string(), id.to_string())
    }

    fn list(&self, session: &str, complete: bool) -> Vec<ExecutionRecord> {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .filter(|((s, _), (c, _))| s == session && *c == complete)
            .map(|(_, (_, r))| r.clone())
            .collect()
    }
}

impl ExecutionStore for MemoryExecutionStore {
    fn insert_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        records.insert(
            Self::key(&record.session_id, record.id()),
            (false, record.clone()),
        );
        Ok(())
    }

    fn update_pending(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.insert_pending(record)
    }

    fn complete(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let key = Self::key(&record.session_id, record.id());
        if matches!(records.get(&key), Some((true, _))) {
            return Err(StoreError::AlreadyComplete(record.id().to_string()));
        }
        records.insert(
            Self::key(&record.session_id, record.id()),
            (true, record.clone()),
        );
        Ok(())
    }

    fn get(&self, session: &str, id: &CommandId) -> Result<Option<ExecutionRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&Self::key(session, id)).map(|(_, r)| r.clone()))
    }

    fn list_pending(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.list(session, false))
    }

    fn list_complete(&self, session: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.list(session, true))
    }

    fn sessions(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut sessions: Vec<String> = records.keys().map(|(s, _)| s.clone()).collect();
        sessions.dedup();
        Ok(sessions)
    }

    fn remove_session(&self, session: &str) -> Result<usize, StoreError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(s, _), _| s != session);
        Ok(before - records.len())
    }
}

/// Status of a stored record, for assertions.
pub(crate) fn stored_status(
    store: &MemoryExecutionStore,
    session: &str,
    id: &CommandId,
) -> Option<(bool, CommandStatus)> {
    let records = store.records.lock().unwrap();
    records
        .get(&MemoryExecutionStore::key(session, id))
        .map(|(complete, r)| (*complete, r.status()))
}

// ==================== Backend ====================

/// Backend answering from a table of canned outputs keyed by command string.
#[derive(Default)]
pub(crate) struct FakeBackend {
    outputs: HashMap<String, Result<ProcessOutput, BackendError>>,
    executed: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_output(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
        self.outputs.insert(
            command.to_string(),
            Ok(ProcessOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(exit_code),
                elapsed: Duration::from_millis(15),
            }),
        );
        self
    }

    pub(crate) fn with_error(mut self, command: &str, error: BackendError) -> Self {
        self.outputs.insert(command.to_string(), Err(error));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandBackend for FakeBackend {
    async fn execute(
        &self,
        command: &str,
        _timeout: Duration,
    ) -> Result<ProcessOutput, BackendError> {
        self.executed.lock().unwrap().push(command.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outputs.get(command).cloned().unwrap_or_else(|| {
            Ok(ProcessOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
                elapsed: Duration::from_millis(1),
            })
        })
    }
}

// ==================== Oracle ====================

/// Oracle replaying queued answers per call type.
///
/// An empty THINK queue answers "not satisfied"; other empty queues answer
/// with a malformed-response failure.
#[derive(Default)]
pub(crate) struct ScriptedOracle {
    think: Mutex<VecDeque<Result<ThinkDecision, OracleFailure>>>,
    plan: Mutex<VecDeque<Result<PlanDecision, OracleFailure>>>,
    propose: Mutex<VecDeque<Result<ProposeDecision, OracleFailure>>>,
    observe: Mutex<VecDeque<Result<ObserveDecision, OracleFailure>>>,
    contexts: Mutex<Vec<OracleContext>>,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn think(self, decision: ThinkDecision) -> Self {
        self.think.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub(crate) fn plan(self, decision: PlanDecision) -> Self {
        self.plan.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub(crate) fn propose(self, decision: ProposeDecision) -> Self {
        self.propose.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub(crate) fn observe(self, decision: ObserveDecision) -> Self {
        self.observe.lock().unwrap().push_back(Ok(decision));
        self
    }

    pub(crate) fn calls(&self, call: OracleCall) -> usize {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.call == call)
            .count()
    }

    fn next<T>(
        &self,
        queue: &Mutex<VecDeque<Result<T, OracleFailure>>>,
        context: &OracleContext,
    ) -> Option<Result<T, OracleFailure>> {
        self.contexts.lock().unwrap().push(context.clone());
        queue.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl OraclePort for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn think(&self, context: &OracleContext) -> Result<ThinkDecision, OracleFailure> {
        self.next(&self.think, context)
            .unwrap_or_else(|| Ok(ThinkDecision::default()))
    }

    async fn plan(&self, context: &OracleContext) -> Result<PlanDecision, OracleFailure> {
        self.next(&self.plan, context)
            .unwrap_or_else(|| Err(OracleFailure::malformed(OracleCall::Plan, "script exhausted")))
    }

    async fn propose(&self, context: &OracleContext) -> Result<ProposeDecision, OracleFailure> {
        self.next(&self.propose, context).unwrap_or_else(|| {
            Err(OracleFailure::malformed(
                OracleCall::Propose,
                "script exhausted",
            ))
        })
    }

    async fn observe(&self, context: &OracleContext) -> Result<ObserveDecision, OracleFailure> {
        self.next(&self.observe, context).unwrap_or_else(|| {
            Err(OracleFailure::malformed(
                OracleCall::Observe,
                "script exhausted",
            ))
        })
    }
}

// ==================== Catalog ====================

/// nmap with two recon intents and its flag allowlist.
pub(crate) fn nmap_catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(
        ToolDescriptor::new("nmap", ToolCategory::Discovery)
            .with_phases(&[RedTeamPhase::Recon, RedTeamPhase::Enumeration])
            .with_intent(
                IntentTemplate::new("host_discovery", "nmap -sn {target}")
                    .with_required(&["target"]),
            )
            .with_intent(
                IntentTemplate::new("port_scan_quick", "nmap -sS --top-ports 100 {target}")
                    .with_required(&["target"]),
            )
            .with_safe_flags(&["-sn", "-sS", "-sV", "--top-ports", "-p", "-Pn", "-T4"]),
    );
    catalog
}
