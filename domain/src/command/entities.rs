//! Command record state machine.
//!
//! Tracks the lifecycle of one proposed shell command from the moment the
//! agent loop renders it until the execution tracker captures its result.
//!
//! # State Transitions
//!
//! ```text
//! Pending ──> Running ──> Complete { success, stdout, stderr, exit_code }
//! ```
//!
//! A record is created by the agent loop, but only the execution tracker
//! moves it forward. Transitions from the wrong state are rejected with
//! [`DomainError::InvalidTransition`] instead of silently ignored, because a
//! skipped transition here would mean a command ran twice or never ran.

use crate::core::error::DomainError;
use crate::session::phase::RedTeamPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique, monotonically distinguishable identifier for a command.
///
/// Rendered from the session's counter as `cmd-0001`, `cmd-0002`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(String);

impl CommandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Render a counter value as a stable token.
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("cmd-{:04}", seq))
    }

    /// Sequence number of an id made by [`CommandId::from_sequence`].
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix("cmd-")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommandId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CommandId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Coarse status tag reported by the tracker's `status()` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Running,
    Complete,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a completed command is marked unsuccessful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The process exited with a non-zero status.
    NonZeroExit { code: i32 },
    /// The process exceeded its wall-clock budget and was killed.
    Timeout { after_secs: u64 },
    /// The engine died while the command was running; it is never re-run.
    Interrupted,
    /// The execution backend itself failed (spawn error, I/O error).
    Backend { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NonZeroExit { code } => write!(f, "exited with code {}", code),
            FailureReason::Timeout { after_secs } => {
                write!(f, "timed out after {}s", after_secs)
            }
            FailureReason::Interrupted => write!(f, "interrupted"),
            FailureReason::Backend { message } => write!(f, "backend failure: {}", message),
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub failure: Option<FailureReason>,
    pub completed_at: DateTime<Utc>,
}

impl CommandOutcome {
    /// Build an outcome from a process exit. Success means exit code 0.
    pub fn from_exit(stdout: String, stderr: String, exit_code: i32, elapsed_ms: u64) -> Self {
        let failure = (exit_code != 0).then_some(FailureReason::NonZeroExit { code: exit_code });
        Self {
            success: exit_code == 0,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            elapsed_ms,
            failure,
            completed_at: Utc::now(),
        }
    }

    /// Build an unsuccessful outcome that carries no exit status.
    pub fn failed(reason: FailureReason, stdout: String, stderr: String, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            stdout,
            stderr,
            exit_code: None,
            elapsed_ms,
            failure: Some(reason),
            completed_at: Utc::now(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, Some(FailureReason::Timeout { .. }))
    }
}

/// Lifecycle state of a command; only the fields meaningful in each state exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandState {
    Pending,
    Running { started_at: DateTime<Utc> },
    Complete(CommandOutcome),
}

impl CommandState {
    pub fn status(&self) -> CommandStatus {
        match self {
            CommandState::Pending => CommandStatus::Pending,
            CommandState::Running { .. } => CommandStatus::Running,
            CommandState::Complete(_) => CommandStatus::Complete,
        }
    }
}

/// One proposed action, from rendering to captured result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub tool: String,
    pub intent: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Final string handed to the shell.
    pub rendered_command: String,
    /// Phase the command was proposed in.
    pub phase: RedTeamPhase,
    /// Oracle's justification, shown at the approval gate.
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub state: CommandState,
}

impl CommandRecord {
    pub fn new(
        id: impl Into<CommandId>,
        tool: impl Into<String>,
        intent: impl Into<String>,
        rendered_command: impl Into<String>,
        phase: RedTeamPhase,
    ) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            intent: intent.into(),
            parameters: BTreeMap::new(),
            rendered_command: rendered_command.into(),
            phase,
            reasoning: String::new(),
            created_at: Utc::now(),
            state: CommandState::Pending,
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, serde_json::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn status(&self) -> CommandStatus {
        self.state.status()
    }

    pub fn is_complete(&self) -> bool {
        self.status() == CommandStatus::Complete
    }

    pub fn outcome(&self) -> Option<&CommandOutcome> {
        match &self.state {
            CommandState::Complete(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Replace the rendered string (human edit at the approval gate).
    pub fn edit_command(&mut self, rendered: impl Into<String>) {
        self.rendered_command = rendered.into();
    }

    /// Transition from Pending to Running.
    pub fn mark_running(&mut self) -> Result<(), DomainError> {
        match self.state {
            CommandState::Pending => {
                self.state = CommandState::Running {
                    started_at: Utc::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid_transition("running")),
        }
    }

    /// Transition from Running to Complete.
    pub fn mark_complete(&mut self, outcome: CommandOutcome) -> Result<(), DomainError> {
        match self.state {
            CommandState::Running { .. } => {
                self.state = CommandState::Complete(outcome);
                Ok(())
            }
            _ => Err(self.invalid_transition("complete")),
        }
    }

    /// Close out a record found Running after a crash.
    ///
    /// The command may or may not have finished on the host; it is recorded
    /// as an unsuccessful completion and never re-run.
    pub fn mark_interrupted(&mut self) -> Result<(), DomainError> {
        let elapsed_ms = match &self.state {
            CommandState::Running { started_at } => (Utc::now() - *started_at)
                .num_milliseconds()
                .max(0) as u64,
            _ => return Err(self.invalid_transition("complete")),
        };
        self.state = CommandState::Complete(CommandOutcome::failed(
            FailureReason::Interrupted,
            String::new(),
            String::new(),
            elapsed_ms,
        ));
        Ok(())
    }

    /// Snapshot of the finished command, if complete.
    pub fn completed(&self) -> Option<CompletedCommand> {
        self.outcome().map(|outcome| CompletedCommand {
            id: self.id.clone(),
            tool: self.tool.clone(),
            intent: self.intent.clone(),
            rendered_command: self.rendered_command.clone(),
            outcome: outcome.clone(),
        })
    }

    fn invalid_transition(&self, to: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            id: self.id.to_string(),
            from: self.status().as_str(),
            to,
        }
    }
}

/// Result returned by the tracker for a COMPLETE command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedCommand {
    pub id: CommandId,
    pub tool: String,
    pub intent: String,
    pub rendered_command: String,
    pub outcome: CommandOutcome,
}

/// A command as stored by the execution tracker, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub session_id: String,
    pub submitted_at: DateTime<Utc>,
    pub command: CommandRecord,
    /// Process that marked the record RUNNING.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_pid: Option<u32>,
}

impl ExecutionRecord {
    pub fn new(session_id: impl Into<String>, command: CommandRecord) -> Self {
        Self {
            session_id: session_id.into(),
            submitted_at: Utc::now(),
            command,
            runner_pid: None,
        }
    }

    pub fn id(&self) -> &CommandId {
        &self.command.id
    }

    pub fn status(&self) -> CommandStatus {
        self.command.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pending() -> CommandRecord {
        CommandRecord::new(
            CommandId::from_sequence(1),
            "nmap",
            "host_discovery",
            "nmap -sn 192.168.1.0/24",
            RedTeamPhase::Recon,
        )
    }

    #[test]
    fn test_command_id_from_sequence() {
        assert_eq!(CommandId::from_sequence(7).as_str(), "cmd-0007");
        assert!(CommandId::from_sequence(9) < CommandId::from_sequence(10));
        assert_eq!(CommandId::from_sequence(12345).sequence(), Some(12345));
        assert_eq!(CommandId::new("manual").sequence(), None);
    }

    #[test]
    fn test_new_is_pending() {
        let cmd = make_pending();
        assert_eq!(cmd.status(), CommandStatus::Pending);
        assert!(cmd.outcome().is_none());
        assert!(cmd.completed().is_none());
    }

    #[test]
    fn test_pending_to_running_to_complete() {
        let mut cmd = make_pending();
        cmd.mark_running().unwrap();
        assert_eq!(cmd.status(), CommandStatus::Running);

        let outcome = CommandOutcome::from_exit("Host is up".into(), String::new(), 0, 120);
        cmd.mark_complete(outcome).unwrap();
        assert!(cmd.is_complete());

        let done = cmd.completed().unwrap();
        assert!(done.outcome.success);
        assert_eq!(done.outcome.exit_code, Some(0));
        assert!(done.outcome.failure.is_none());
    }

    #[test]
    fn test_nonzero_exit_is_unsuccessful() {
        let outcome = CommandOutcome::from_exit(String::new(), "denied".into(), 2, 5);
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureReason::NonZeroExit { code: 2 }));
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut cmd = make_pending();
        let err = cmd
            .mark_complete(CommandOutcome::from_exit(String::new(), String::new(), 0, 0))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { from: "pending", .. }));
        assert_eq!(cmd.status(), CommandStatus::Pending);
    }

    #[test]
    fn test_complete_cannot_run_again() {
        let mut cmd = make_pending();
        cmd.mark_running().unwrap();
        cmd.mark_complete(CommandOutcome::from_exit(String::new(), String::new(), 0, 0))
            .unwrap();
        assert!(cmd.mark_running().is_err());
        assert!(cmd.is_complete());
    }

    #[test]
    fn test_running_interrupted_becomes_failed_completion() {
        let mut cmd = make_pending();
        cmd.mark_running().unwrap();
        cmd.mark_interrupted().unwrap();

        let outcome = cmd.outcome().unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureReason::Interrupted));
    }

    #[test]
    fn test_pending_cannot_be_interrupted() {
        let mut cmd = make_pending();
        assert!(cmd.mark_interrupted().is_err());
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let json = serde_json::to_value(make_pending()).unwrap();
        assert_eq!(json["state"]["status"], "pending");
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::Timeout { after_secs: 30 }.to_string(),
            "timed out after 30s"
        );
        assert_eq!(FailureReason::Interrupted.to_string(), "interrupted");
    }
}
