//! Type definitions for the RunAgent use case.

use crate::ports::approval::ApprovalError;
use crate::use_cases::execution_tracker::TrackerError;
use crate::use_cases::state_recovery::RecoveryError;
use gauntlet_domain::command::CommandId;
use gauntlet_domain::core::error::DomainError;
use gauntlet_domain::facts::FactSummary;
use gauntlet_domain::session::{RedTeamPhase, SessionId};
use thiserror::Error;

/// Errors that abort the current invocation.
///
/// Recoverable conditions (oracle failures, safety rejections, denied
/// approvals, failed commands) never surface here; they are appended to the
/// session's failures and the loop carries on.
#[derive(Error, Debug)]
pub enum RunAgentError {
    #[error("Session {0} is already done")]
    AlreadyDone(SessionId),

    #[error("Execution tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("State persistence failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Approval failed: {0}")]
    Approval(ApprovalError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RunAgentError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunAgentError::Cancelled)
    }
}

impl From<ApprovalError> for RunAgentError {
    fn from(error: ApprovalError) -> Self {
        match error {
            ApprovalError::Cancelled => RunAgentError::Cancelled,
            other => RunAgentError::Approval(other),
        }
    }
}

/// What the loop does once a command has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Persist and return at AWAITING_EXECUTION; the command is run later.
    #[default]
    Suspend,
    /// Run submitted commands on the tracker worker and keep cycling.
    Wait,
}

/// Why an invocation returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The oracle reported the goal satisfied.
    Done,
    /// A command is waiting for execution.
    Suspended { command: CommandId },
    /// The per-invocation cycle budget ran out.
    CycleLimit,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Done => write!(f, "goal satisfied"),
            StopReason::Suspended { command } => write!(f, "waiting for {} to run", command),
            StopReason::CycleLimit => write!(f, "cycle limit reached"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Output from the RunAgent use case
#[derive(Debug, Clone)]
pub struct RunAgentOutput {
    pub stop: StopReason,
    pub phase: RedTeamPhase,
    pub cycle: u64,
    pub facts: FactSummary,
    pub failures: usize,
}

/// Result of one state handler.
pub(super) enum Step {
    Continue,
    Stop(StopReason),
}
