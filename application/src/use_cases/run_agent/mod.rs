//! Run Agent use case
//!
//! Drives one session through the agent loop:
//!
//! ```text
//! THINKING → PLANNING → PROPOSING → AWAITING_APPROVAL → AWAITING_EXECUTION → OBSERVING
//!    ↑  │        ↑          │               │                                  │
//!    │  └→ DONE  └──────────┴─ re-plan ─────┘                                  │
//!    └─────────────────────────── next cycle ──────────────────────────────────┘
//! ```
//!
//! | State              | Handler                     | Module       |
//! |--------------------|-----------------------------|--------------|
//! | THINKING           | oracle THINK, phase advance | `decide`     |
//! | PLANNING           | oracle PLAN over the phase  | `decide`     |
//! | PROPOSING          | oracle PROPOSE, render, 3 safety layers | `decide` |
//! | AWAITING_APPROVAL  | human gate, submit          | `gates`      |
//! | AWAITING_EXECUTION | tracker poll / run / suspend | `execution` |
//! | OBSERVING          | oracle OBSERVE, fact merge  | `execution`  |
//!
//! The session is persisted after every handler, so a snapshot always
//! reflects the state the next handler will start from.

mod decide;
mod execution;
mod gates;
mod types;

pub use types::{RunAgentError, RunAgentOutput, RunMode, StopReason};

use types::Step;

use crate::config::ExecutionParams;
use crate::ports::agent_progress::{AgentProgressNotifier, NoAgentProgress};
use crate::ports::approval::ApprovalPort;
use crate::ports::event_log::{NoSessionEventLogger, SessionEvent, SessionEventLogger};
use crate::ports::tool_catalog::ToolCatalogPort;
use crate::use_cases::execution_tracker::ExecutionTracker;
use crate::use_cases::oracle_client::OracleAnswer;
use crate::use_cases::oracle_client::OracleClient;
use crate::use_cases::shared::check_cancelled;
use crate::use_cases::state_recovery::StateRecovery;
use gauntlet_domain::oracle::OracleCall;
use gauntlet_domain::safety::SafetyPolicy;
use gauntlet_domain::session::{FailureKind, FailureRecord, LoopState, Session};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Use case for driving the agent loop of one session.
pub struct RunAgentUseCase {
    pub(super) oracle: OracleClient,
    pub(super) catalog: Arc<dyn ToolCatalogPort>,
    pub(super) policy: Arc<SafetyPolicy>,
    pub(super) tracker: Arc<ExecutionTracker>,
    pub(super) recovery: Arc<StateRecovery>,
    pub(super) approval: Arc<dyn ApprovalPort>,
    pub(super) events: Arc<dyn SessionEventLogger>,
    pub(super) params: ExecutionParams,
    pub(super) cancellation_token: Option<CancellationToken>,
}

impl Clone for RunAgentUseCase {
    fn clone(&self) -> Self {
        Self {
            oracle: self.oracle.clone(),
            catalog: self.catalog.clone(),
            policy: self.policy.clone(),
            tracker: self.tracker.clone(),
            recovery: self.recovery.clone(),
            approval: self.approval.clone(),
            events: self.events.clone(),
            params: self.params.clone(),
            cancellation_token: self.cancellation_token.clone(),
        }
    }
}

impl RunAgentUseCase {
    pub fn new(
        oracle: OracleClient,
        catalog: Arc<dyn ToolCatalogPort>,
        policy: Arc<SafetyPolicy>,
        tracker: Arc<ExecutionTracker>,
        recovery: Arc<StateRecovery>,
        approval: Arc<dyn ApprovalPort>,
        params: ExecutionParams,
    ) -> Self {
        Self {
            oracle,
            catalog,
            policy,
            tracker,
            recovery,
            approval,
            events: Arc::new(NoSessionEventLogger),
            params,
            cancellation_token: None,
        }
    }

    /// Set a structured session event logger
    pub fn with_event_logger(mut self, events: Arc<dyn SessionEventLogger>) -> Self {
        self.events = events;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub async fn execute(
        &self,
        session: &mut Session,
        mode: RunMode,
    ) -> Result<RunAgentOutput, RunAgentError> {
        self.execute_with_progress(session, mode, &NoAgentProgress)
            .await
    }

    /// Drive `session` until it is done, suspends, is cancelled or spends
    /// `max_cycles` cycles.
    ///
    /// A session loaded at AWAITING_EXECUTION continues by consulting the
    /// tracker for its pending command; it is never re-proposed.
    pub async fn execute_with_progress(
        &self,
        session: &mut Session,
        mode: RunMode,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<RunAgentOutput, RunAgentError> {
        if session.is_done() {
            return Err(RunAgentError::AlreadyDone(session.id().clone()));
        }

        info!(
            session_id = %session.id(),
            phase = %session.phase,
            loop_state = %session.loop_state,
            cycle = session.cycle,
            "Agent loop started"
        );

        if session.cycle == 0 {
            self.begin_cycle(session, progress);
        }
        let first_cycle = session.cycle;

        loop {
            let state = session.loop_state;
            if state == LoopState::Thinking
                && session.cycle - first_cycle >= u64::from(self.params.max_cycles)
            {
                info!(session_id = %session.id(), cycle = session.cycle, "Cycle limit reached");
                self.persist(session)?;
                return Ok(self.output(session, StopReason::CycleLimit));
            }
            progress.on_loop_state(state);

            let step = match check_cancelled(&self.cancellation_token) {
                Ok(()) => self.step(session, mode, progress).await,
                Err(e) => Err(e),
            };

            match step {
                Ok(Step::Continue) => self.persist(session)?,
                Ok(Step::Stop(stop)) => {
                    self.persist(session)?;
                    info!(session_id = %session.id(), stop = %stop, "Agent loop stopped");
                    return Ok(self.output(session, stop));
                }
                Err(RunAgentError::Cancelled) => {
                    info!(session_id = %session.id(), loop_state = %session.loop_state, "Agent loop cancelled");
                    self.persist(session)?;
                    return Ok(self.output(session, StopReason::Cancelled));
                }
                Err(e) => {
                    if let Err(save_error) = self.recovery.save(session) {
                        warn!(session_id = %session.id(), error = %save_error, "Failed to save session after error");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn step(
        &self,
        session: &mut Session,
        mode: RunMode,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<Step, RunAgentError> {
        match session.loop_state {
            LoopState::Thinking => Ok(self.think(session, progress).await),
            LoopState::Planning => Ok(self.plan(session, progress).await),
            LoopState::Proposing => Ok(self.propose(session, progress).await),
            LoopState::AwaitingApproval => self.approve(session, progress).await,
            LoopState::AwaitingExecution => self.await_execution(session, mode, progress).await,
            LoopState::Observing => self.observe(session, progress).await,
            LoopState::Done => Ok(Step::Stop(StopReason::Done)),
        }
    }

    // ==================== Shared helpers ====================

    pub(super) fn persist(&self, session: &Session) -> Result<(), RunAgentError> {
        self.recovery.save(session)?;
        Ok(())
    }

    pub(super) fn begin_cycle(&self, session: &mut Session, progress: &dyn AgentProgressNotifier) {
        session.begin_cycle();
        info!(session_id = %session.id(), cycle = session.cycle, phase = %session.phase, "Cycle started");
        progress.on_cycle_start(session.cycle);
    }

    pub(super) fn log_event(&self, session: &Session, event_type: &'static str, payload: serde_json::Value) {
        self.events
            .log(session.id(), SessionEvent::new(event_type, payload));
    }

    /// Append a failure record and report it.
    pub(super) fn fail(
        &self,
        session: &mut Session,
        failure: FailureRecord,
        progress: &dyn AgentProgressNotifier,
    ) {
        warn!(
            session_id = %session.id(),
            phase = %failure.phase,
            kind = %failure.kind,
            reason = %failure.reason,
            "Failure recorded"
        );
        self.log_event(
            session,
            "failure",
            json!({
                "kind": failure.kind.as_str(),
                "phase": failure.phase.as_str(),
                "intent": failure.intent,
                "command": failure.command,
                "reason": failure.reason,
            }),
        );
        progress.on_failure(&failure);
        session.push_failure(failure);
    }

    /// Count an oracle call and record the failure behind a fallback.
    pub(super) fn note_oracle<T>(
        &self,
        session: &mut Session,
        call: OracleCall,
        answer: &OracleAnswer<T>,
        progress: &dyn AgentProgressNotifier,
    ) {
        session.oracle_calls += u64::from(answer.attempts);
        if let Some(error) = &answer.degraded {
            let mut failure = FailureRecord::new(
                FailureKind::OracleFailure,
                session.phase,
                format!("{} fell back after {} attempt(s): {}", call, answer.attempts, error),
            );
            failure.intent = session.current_intent.clone();
            self.fail(session, failure, progress);
        }
    }

    /// End the cycle early with a recorded failure.
    pub(super) fn end_cycle(
        &self,
        session: &mut Session,
        kind: FailureKind,
        reason: String,
        progress: &dyn AgentProgressNotifier,
    ) -> Step {
        let mut failure = FailureRecord::new(kind, session.phase, reason);
        failure.intent = session.current_intent.clone();
        self.fail(session, failure, progress);
        session.proposal = None;
        self.begin_cycle(session, progress);
        Step::Continue
    }

    fn output(&self, session: &Session, stop: StopReason) -> RunAgentOutput {
        RunAgentOutput {
            stop,
            phase: session.phase,
            cycle: session.cycle,
            facts: session.facts.summary(),
            failures: session.failures().len(),
        }
    }
}
