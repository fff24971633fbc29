//! AWAITING_EXECUTION and OBSERVING handlers.

use super::RunAgentUseCase;
use super::types::{RunAgentError, RunMode, Step, StopReason};
use crate::ports::agent_progress::AgentProgressNotifier;
use crate::use_cases::execution_tracker::TrackerError;
use gauntlet_domain::command::{CommandStatus, FailureReason};
use gauntlet_domain::core::error::DomainError;
use gauntlet_domain::facts::absorb;
use gauntlet_domain::oracle::{OracleCall, OracleContext};
use gauntlet_domain::session::{FailureKind, FailureRecord, LoopState, Session};
use serde_json::json;
use tracing::{debug, info};

impl RunAgentUseCase {
    /// Consult the tracker about the pending command.
    ///
    /// Never re-proposes while the command is PENDING or RUNNING.
    pub(super) async fn await_execution(
        &self,
        session: &mut Session,
        mode: RunMode,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<Step, RunAgentError> {
        let Some(id) = session.pending_command.clone() else {
            session.set_loop_state(LoopState::Planning);
            return Ok(Step::Continue);
        };
        let session_id = session.id().to_string();

        let status = match self.tracker.status(&session_id, &id) {
            Ok(status) => status,
            Err(TrackerError::NotFound(_)) => {
                let mut failure = FailureRecord::new(
                    FailureKind::ExecutionBackendFailure,
                    session.phase,
                    format!("execution record for {} is missing", id),
                );
                failure.intent = session.current_intent.clone();
                failure.command = session.command(&id).map(|c| c.rendered_command.clone());
                self.fail(session, failure, progress);
                session.pending_command = None;
                session.set_loop_state(LoopState::Planning);
                return Ok(Step::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        match (status, mode) {
            (CommandStatus::Complete, _) => {
                session.set_loop_state(LoopState::Observing);
                Ok(Step::Continue)
            }
            (CommandStatus::Pending | CommandStatus::Running, RunMode::Suspend) => {
                info!(session_id, command_id = %id, status = %status, "Suspending until the command runs");
                progress.on_suspended(&id);
                Ok(Step::Stop(StopReason::Suspended { command: id }))
            }
            (CommandStatus::Pending, RunMode::Wait) => {
                let rendered = session
                    .command(&id)
                    .map(|c| c.rendered_command.clone())
                    .unwrap_or_default();
                progress.on_execution_start(&id, &rendered);
                match self.tracker.spawn_run(&session_id, &id).await {
                    Ok(_) | Err(TrackerError::AlreadyRunning(_)) => Ok(Step::Continue),
                    Err(e) => Err(e.into()),
                }
            }
            (CommandStatus::Running, RunMode::Wait) => {
                debug!(session_id, command_id = %id, "Command running elsewhere, polling");
                tokio::time::sleep(self.params.poll_interval).await;
                Ok(Step::Continue)
            }
        }
    }

    pub(super) async fn observe(
        &self,
        session: &mut Session,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<Step, RunAgentError> {
        let Some(id) = session.pending_command.clone() else {
            self.begin_cycle(session, progress);
            return Ok(Step::Continue);
        };
        let record = self.tracker.record(session.id().as_str(), &id)?;
        let Some(completed) = record.command.completed() else {
            session.set_loop_state(LoopState::AwaitingExecution);
            return Ok(Step::Continue);
        };

        match session.update_command(record.command.clone()) {
            Ok(()) => {}
            Err(DomainError::UnknownCommand(_)) => session.add_command(record.command)?,
            Err(e) => return Err(e.into()),
        }
        progress.on_execution_complete(&completed);

        let outcome = &completed.outcome;
        if let Some(reason) = &outcome.failure {
            let kind = match reason {
                FailureReason::Timeout { .. } => FailureKind::ExecutionTimeout,
                FailureReason::Backend { .. } => FailureKind::ExecutionBackendFailure,
                FailureReason::Interrupted => FailureKind::Interrupted,
                FailureReason::NonZeroExit { .. } => FailureKind::CommandFailed,
            };
            let failure = FailureRecord::new(kind, session.phase, reason.to_string())
                .with_intent(&completed.intent)
                .with_command(&completed.rendered_command);
            self.fail(session, failure, progress);
        }

        // Failed and timed-out commands are observed too; partial output can
        // still carry facts.
        let context = OracleContext::observe(session, &completed, self.params.observe_output_bytes);
        let answer = self.oracle.observe(&context, progress).await;
        self.note_oracle(session, OracleCall::Observe, &answer, progress);

        let growth = absorb(&mut session.facts, &answer.value.facts);
        info!(
            session_id = %session.id(),
            command_id = %id,
            success = outcome.success,
            new_hosts = growth.hosts,
            new_services = growth.services,
            new_vulnerabilities = growth.vulnerabilities,
            "Observed"
        );
        self.log_event(
            session,
            "facts_merged",
            json!({
                "command_id": id.as_str(),
                "summary": answer.value.summary,
                "growth": growth,
                "totals": session.facts.summary(),
            }),
        );
        progress.on_facts_merged(&growth);

        session.pending_command = None;
        self.begin_cycle(session, progress);
        Ok(Step::Continue)
    }
}
