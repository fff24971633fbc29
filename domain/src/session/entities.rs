//! Session aggregate.
//!
//! A [`Session`] is the root of everything one engagement accumulates: the
//! goal, the current phase, facts, command history and failures. It is
//! owned by exactly one run at a time and serialized after every phase
//! transition and before every suspension.

use super::phase::{LoopState, RedTeamPhase};
use crate::command::{CommandId, CommandRecord, CommandStatus};
use crate::core::error::DomainError;
use crate::facts::FactStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Opaque, immutable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Time-based id, e.g. `session-20261019-142501-123456`.
    pub fn generate() -> Self {
        Self(Utc::now().format("session-%Y%m%d-%H%M%S-%6f").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One recorded phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RedTeamPhase,
    pub to: RedTeamPhase,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Category of a recorded error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OracleFailure,
    SafetyRejection,
    ApprovalDenied,
    ExecutionTimeout,
    ExecutionBackendFailure,
    CommandFailed,
    ReplanExhausted,
    ProposalInvalid,
    StateRollback,
    Interrupted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::OracleFailure => "oracle_failure",
            FailureKind::SafetyRejection => "safety_rejection",
            FailureKind::ApprovalDenied => "approval_denied",
            FailureKind::ExecutionTimeout => "execution_timeout",
            FailureKind::ExecutionBackendFailure => "execution_backend_failure",
            FailureKind::CommandFailed => "command_failed",
            FailureKind::ReplanExhausted => "replan_exhausted",
            FailureKind::ProposalInvalid => "proposal_invalid",
            FailureKind::StateRollback => "state_rollback",
            FailureKind::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error event with enough context to rebuild a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: FailureKind,
    pub phase: RedTeamPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub reason: String,
}

impl FailureRecord {
    pub fn new(kind: FailureKind, phase: RedTeamPhase, reason: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            phase,
            intent: None,
            command: None,
            reason: reason.into(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// What [`Session::reconcile_executions`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Tracked commands the history lacked, now appended.
    pub added: Vec<CommandId>,
    /// Command the session is now suspended on.
    pub adopted: Option<CommandId>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.adopted.is_none()
    }
}

/// Root aggregate of one engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub phase: RedTeamPhase,
    #[serde(default)]
    phase_history: Vec<PhaseTransition>,
    #[serde(default)]
    pub loop_state: LoopState,
    #[serde(default)]
    pub facts: FactStore,
    #[serde(default)]
    commands_executed: Vec<CommandRecord>,
    #[serde(default)]
    failures: Vec<FailureRecord>,
    #[serde(default)]
    done: bool,

    /// Objective chosen by the last PLAN.
    #[serde(default)]
    pub current_objective: Option<String>,
    #[serde(default)]
    pub current_intent: Option<String>,
    /// Command held at the approval gate; not yet known to the tracker.
    #[serde(default)]
    pub proposal: Option<CommandRecord>,
    /// Command the loop is suspended on while awaiting execution.
    #[serde(default)]
    pub pending_command: Option<CommandId>,
    #[serde(default = "first_sequence")]
    next_command_seq: u64,
    #[serde(default)]
    pub cycle: u64,
    #[serde(default)]
    pub oracle_calls: u64,
    /// Safety re-plans spent in the current cycle.
    #[serde(default)]
    pub safety_replans: u32,
    /// Intents given up on for the current cycle.
    #[serde(default)]
    pub unavailable_intents: BTreeSet<String>,
    /// Binary presence per catalog tool, as probed at start.
    #[serde(default)]
    pub tools_available: BTreeMap<String, bool>,
    #[serde(default)]
    pub last_reasoning: Option<String>,
}

fn first_sequence() -> u64 {
    1
}

impl Session {
    pub fn new(goal: impl Into<String>) -> Self {
        Self::with_id(SessionId::generate(), goal)
    }

    pub fn with_id(session_id: impl Into<SessionId>, goal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            goal: goal.into(),
            created_at: now,
            updated_at: now,
            phase: RedTeamPhase::default(),
            phase_history: Vec::new(),
            loop_state: LoopState::default(),
            facts: FactStore::new(),
            commands_executed: Vec::new(),
            failures: Vec::new(),
            done: false,
            current_objective: None,
            current_intent: None,
            proposal: None,
            pending_command: None,
            next_command_seq: first_sequence(),
            cycle: 0,
            oracle_calls: 0,
            safety_replans: 0,
            unavailable_intents: BTreeSet::new(),
            tools_available: BTreeMap::new(),
            last_reasoning: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn phase_history(&self) -> &[PhaseTransition] {
        &self.phase_history
    }

    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands_executed
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn set_loop_state(&mut self, state: LoopState) {
        self.loop_state = state;
        self.touch();
    }

    /// Advance to the next phase. Returns the recorded transition, or `None`
    /// when already at the last phase.
    pub fn transition_phase(&mut self, reason: impl Into<String>) -> Option<&PhaseTransition> {
        let to = self.phase.next()?;
        self.phase_history.push(PhaseTransition {
            from: self.phase,
            to,
            reason: reason.into(),
            timestamp: Utc::now(),
        });
        self.phase = to;
        self.touch();
        self.phase_history.last()
    }

    /// Set `done` once. Returns `false` if it was already set.
    pub fn mark_done(&mut self, reasoning: impl Into<String>) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        self.loop_state = LoopState::Done;
        self.last_reasoning = Some(reasoning.into());
        self.touch();
        true
    }

    /// Append a failure tagged with the current phase and intent.
    pub fn record_failure(&mut self, kind: FailureKind, reason: impl Into<String>) -> &FailureRecord {
        let mut record = FailureRecord::new(kind, self.phase, reason);
        record.intent = self.current_intent.clone();
        self.push_failure(record)
    }

    pub fn push_failure(&mut self, record: FailureRecord) -> &FailureRecord {
        self.failures.push(record);
        self.touch();
        &self.failures[self.failures.len() - 1]
    }

    /// Allocate the next command id.
    pub fn next_command_id(&mut self) -> CommandId {
        let id = CommandId::from_sequence(self.next_command_seq);
        self.next_command_seq += 1;
        id
    }

    /// Append a command to the history.
    pub fn add_command(&mut self, record: CommandRecord) -> Result<(), DomainError> {
        if self.command(&record.id).is_some() {
            return Err(DomainError::DuplicateCommandId(record.id.to_string()));
        }
        self.commands_executed.push(record);
        self.touch();
        Ok(())
    }

    pub fn command(&self, id: &CommandId) -> Option<&CommandRecord> {
        self.commands_executed.iter().find(|c| &c.id == id)
    }

    /// Replace a recorded command with the tracker's newer copy.
    pub fn update_command(&mut self, record: CommandRecord) -> Result<(), DomainError> {
        let slot = self
            .commands_executed
            .iter_mut()
            .find(|c| c.id == record.id)
            .ok_or_else(|| DomainError::UnknownCommand(record.id.to_string()))?;
        *slot = record;
        self.touch();
        Ok(())
    }

    pub fn last_command(&self) -> Option<&CommandRecord> {
        self.commands_executed.last()
    }

    /// Start a new THINK cycle, forgetting per-cycle bookkeeping.
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
        self.safety_replans = 0;
        self.unavailable_intents.clear();
        self.loop_state = LoopState::Thinking;
        self.touch();
    }

    /// Align a session restored from an older snapshot with the tracker.
    ///
    /// `records` are the session's execution records, oldest submission
    /// first. Command ids continue past every tracked id and commands the
    /// history lacks are appended. Unless the session is already suspended
    /// on a command, it suspends on the first record still PENDING or
    /// RUNNING, or else on the newest appended one so its result is
    /// observed.
    pub fn reconcile_executions(&mut self, records: &[CommandRecord]) -> Reconciliation {
        let mut changes = Reconciliation::default();
        for record in records {
            if let Some(seq) = record.id.sequence() {
                self.next_command_seq = self.next_command_seq.max(seq + 1);
            }
            if self.command(&record.id).is_none() {
                self.commands_executed.push(record.clone());
                changes.added.push(record.id.clone());
            }
        }

        let suspended =
            self.loop_state == LoopState::AwaitingExecution && self.pending_command.is_some();
        if !suspended && !self.done {
            let adopt = records
                .iter()
                .find(|r| r.status() != CommandStatus::Complete)
                .map(|r| r.id.clone())
                .or_else(|| changes.added.last().cloned());
            if let Some(id) = adopt {
                self.current_intent = records
                    .iter()
                    .find(|r| r.id == id)
                    .map(|r| r.intent.clone());
                self.proposal = None;
                self.pending_command = Some(id.clone());
                self.loop_state = LoopState::AwaitingExecution;
                changes.adopted = Some(id);
            }
        }

        if !changes.is_empty() {
            self.touch();
        }
        changes
    }

    pub fn mark_intent_unavailable(&mut self, intent: impl Into<String>) {
        self.unavailable_intents.insert(intent.into());
    }

    /// Structural validation used when loading a snapshot.
    pub fn validate(&self) -> Result<(), DomainError> {
        let corrupt = |msg: String| -> Result<(), DomainError> {
            Err(DomainError::StateCorruption(msg))
        };

        if self.session_id.as_str().trim().is_empty() {
            return corrupt("empty session id".into());
        }
        if self.goal.trim().is_empty() {
            return corrupt("empty goal".into());
        }

        let mut seen = BTreeSet::new();
        for cmd in &self.commands_executed {
            if !seen.insert(&cmd.id) {
                return corrupt(format!("duplicate command id {}", cmd.id));
            }
        }
        let next = CommandId::from_sequence(self.next_command_seq);
        if seen.contains(&&next) {
            return corrupt(format!("next command id {} already used", next));
        }

        let mut phase = RedTeamPhase::default();
        for transition in &self.phase_history {
            if transition.from != phase || transition.to <= transition.from {
                return corrupt(format!(
                    "phase history breaks at {} -> {}",
                    transition.from, transition.to
                ));
            }
            phase = transition.to;
        }
        if phase != self.phase {
            return corrupt(format!(
                "phase {} does not match history ({})",
                self.phase, phase
            ));
        }

        if self.done != (self.loop_state == LoopState::Done) {
            return corrupt(format!(
                "done={} inconsistent with loop state {}",
                self.done, self.loop_state
            ));
        }

        match (self.loop_state, &self.pending_command) {
            (LoopState::AwaitingExecution, None) => {
                return corrupt("awaiting execution without a pending command".into());
            }
            (LoopState::AwaitingExecution, Some(id)) if self.command(id).is_none() => {
                return corrupt(format!("pending command {} not in history", id));
            }
            (LoopState::AwaitingApproval, _) if self.proposal.is_none() => {
                return corrupt("awaiting approval without a proposal".into());
            }
            _ => {}
        }

        let issues = self.facts.integrity_issues();
        if let Some(first) = issues.first() {
            return corrupt(format!("fact store: {}", first));
        }

        Ok(())
    }
}
