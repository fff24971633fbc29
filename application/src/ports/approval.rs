//! Approval port: the human gate before submission.
//!
//! Every command the safety validator accepts is shown to a human before it
//! reaches the execution tracker (unless the policy disables approval).
//!
//! # Architecture
//!
//! Following the Ports and Adapters pattern:
//! - **Port**: [`ApprovalPort`] - defined here in application layer
//! - **Adapter**: `InteractiveApproval` - implemented in presentation layer
//!
//! # Flow
//!
//! ```text
//! PROPOSE → Safety Validator ACCEPTED
//!        ↓
//! ApprovalPort::request_approval()
//!        ↓
//! Approve → submit to tracker
//! Edit    → re-validate the edited string, then submit
//! Reject  → failure recorded, back to PLANNING
//! ```
//!
//! # Built-in Implementations
//!
//! - [`AutoApprove`] - Always approves
//! - [`AutoReject`] - Always rejects

use async_trait::async_trait;
use gauntlet_domain::command::CommandRecord;
use gauntlet_domain::session::RedTeamPhase;
use thiserror::Error;

/// Error type for approval operations.
///
/// These errors represent failures of the approval process itself,
/// not decisions made by the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    /// User cancelled the operation (e.g., via Ctrl+C).
    #[error("Operation cancelled")]
    Cancelled,
    /// Input/output error (e.g., terminal read failure).
    #[error("I/O error: {0}")]
    Io(String),
}

/// What the human decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    /// Run this command string instead.
    Edit(String),
    Reject { reason: Option<String> },
}

/// Everything shown at the approval gate.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub session_id: String,
    pub goal: String,
    pub phase: RedTeamPhase,
    pub objective: Option<String>,
    pub command: CommandRecord,
    /// Non-blocking notes from the safety layer.
    pub advisories: Vec<String>,
}

/// Port for human approval of accepted commands.
///
/// # Implementations
///
/// - **Interactive (CLI)**: `InteractiveApproval` in presentation layer
/// - **Auto-approve**: [`AutoApprove`]
/// - **Auto-reject**: [`AutoReject`]
#[async_trait]
pub trait ApprovalPort: Send + Sync {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError>;
}

/// Approves every accepted command.
///
/// # Warning
///
/// The safety validator becomes the last gate. Only use inside a lab whose
/// allowed networks are configured tightly.
pub struct AutoApprove;

#[async_trait]
impl ApprovalPort for AutoApprove {
    async fn request_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::Approve)
    }
}

/// Rejects every command. Useful for dry runs.
pub struct AutoReject;

#[async_trait]
impl ApprovalPort for AutoReject {
    async fn request_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::Reject {
            reason: Some("automatic rejection".to_string()),
        })
    }
}
