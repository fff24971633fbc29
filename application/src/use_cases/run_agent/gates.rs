//! Approval gate, submission and re-planning.

use super::RunAgentUseCase;
use super::types::{RunAgentError, Step};
use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::approval::{ApprovalDecision, ApprovalRequest};
use crate::use_cases::execution_tracker::TrackerError;
use crate::use_cases::shared::check_cancelled;
use gauntlet_domain::command::CommandRecord;
use gauntlet_domain::safety::{Verdict, approval_advisories};
use gauntlet_domain::session::{FailureKind, FailureRecord, LoopState, Session};
use serde_json::json;
use tracing::{debug, info, warn};

impl RunAgentUseCase {
    pub(super) async fn approve(
        &self,
        session: &mut Session,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<Step, RunAgentError> {
        let Some(mut proposal) = session.proposal.clone() else {
            session.set_loop_state(LoopState::Planning);
            return Ok(Step::Continue);
        };

        if !self.policy.require_approval {
            debug!(session_id = %session.id(), command_id = %proposal.id, "Approval not required");
            return self.submit(session, proposal, progress).await;
        }

        let request = ApprovalRequest {
            session_id: session.id().to_string(),
            goal: session.goal.clone(),
            phase: session.phase,
            objective: session.current_objective.clone(),
            advisories: approval_advisories(&proposal.rendered_command),
            command: proposal.clone(),
        };

        match self.approval.request_approval(&request).await? {
            ApprovalDecision::Approve => {
                self.log_event(
                    session,
                    "approved",
                    json!({ "command_id": proposal.id.as_str() }),
                );
                self.submit(session, proposal, progress).await
            }
            ApprovalDecision::Edit(edited) => {
                // The edited string passes the same three layers again.
                match self.policy.validate(&edited) {
                    Verdict::Accepted => {
                        info!(
                            session_id = %session.id(),
                            command_id = %proposal.id,
                            command = %edited,
                            "Command edited at approval"
                        );
                        self.log_event(
                            session,
                            "edited",
                            json!({ "command_id": proposal.id.as_str(), "command": edited }),
                        );
                        proposal.edit_command(edited);
                        self.submit(session, proposal, progress).await
                    }
                    Verdict::Rejected(reason) => {
                        progress.on_safety_rejection(&edited, &reason);
                        let message = format!("edited command {}: {}", reason.tag(), reason);
                        Ok(self.replan(
                            session,
                            FailureKind::SafetyRejection,
                            message,
                            Some(edited),
                            progress,
                        ))
                    }
                }
            }
            ApprovalDecision::Reject { reason } => {
                progress.on_approval_denied(&proposal, reason.as_deref());
                self.log_event(
                    session,
                    "approval_denied",
                    json!({ "command_id": proposal.id.as_str(), "reason": reason }),
                );
                let message = reason.unwrap_or_else(|| "rejected by operator".to_string());
                Ok(self.replan(
                    session,
                    FailureKind::ApprovalDenied,
                    message,
                    Some(proposal.rendered_command),
                    progress,
                ))
            }
        }
    }

    /// Hand an approved command to the tracker.
    async fn submit(
        &self,
        session: &mut Session,
        proposal: CommandRecord,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<Step, RunAgentError> {
        check_cancelled(&self.cancellation_token)?;

        let session_id = session.id().to_string();
        let id = match self.tracker.submit(&session_id, proposal.clone()).await {
            Ok(id) => id,
            // Submitted before a crash but not yet recorded in the session.
            Err(TrackerError::DuplicateId(id))
                if self
                    .tracker
                    .record(&session_id, &id)
                    .is_ok_and(|r| r.command.rendered_command == proposal.rendered_command) =>
            {
                debug!(session_id, command_id = %id, "Command already submitted");
                id
            }
            Err(e) => return Err(e.into()),
        };

        progress.on_submitted(&id, &proposal.rendered_command);
        self.log_event(
            session,
            "submitted",
            json!({ "command_id": id.as_str(), "command": proposal.rendered_command }),
        );

        if session.command(&id).is_none() {
            session.add_command(proposal)?;
        }
        session.proposal = None;
        session.pending_command = Some(id);
        session.set_loop_state(LoopState::AwaitingExecution);
        Ok(Step::Continue)
    }

    /// Record a recoverable failure and go back to PLANNING.
    ///
    /// Past `max_safety_replans` in one cycle the current intent is given up
    /// for the rest of the cycle.
    pub(super) fn replan(
        &self,
        session: &mut Session,
        kind: FailureKind,
        reason: String,
        command: Option<String>,
        progress: &dyn AgentProgressNotifier,
    ) -> Step {
        let mut failure = FailureRecord::new(kind, session.phase, reason);
        failure.intent = session.current_intent.clone();
        failure.command = command;
        self.fail(session, failure, progress);

        session.proposal = None;
        session.safety_replans += 1;

        if session.safety_replans > self.params.max_safety_replans {
            let intent = session.current_intent.clone();
            warn!(
                session_id = %session.id(),
                intent = intent.as_deref().unwrap_or("-"),
                replans = session.safety_replans,
                "Re-plan budget exhausted"
            );
            let mut exhausted = FailureRecord::new(
                FailureKind::ReplanExhausted,
                session.phase,
                format!(
                    "gave up after {} re-plans this cycle",
                    self.params.max_safety_replans
                ),
            );
            exhausted.intent = intent.clone();
            self.fail(session, exhausted, progress);

            if let Some(intent) = intent {
                session.mark_intent_unavailable(intent);
            }
            session.safety_replans = 0;
        }

        session.set_loop_state(LoopState::Planning);
        Step::Continue
    }
}
