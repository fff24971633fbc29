//! Agent execution progress port.
//!
//! [`AgentProgressNotifier`] is an **output port** that the presentation layer
//! implements to display real-time agent loop progress to the user.
//! All callback argument types come from the domain layer.
//!
//! # Callback Categories
//!
//! - **Loop callbacks**: loop state and phase changes, cycle boundaries
//! - **Decision callbacks**: THINK / PLAN / PROPOSE outcomes
//! - **Gate callbacks**: safety rejections and approval results
//! - **Execution callbacks**: submission, start and completion of commands
//! - **Oracle callbacks**: retries and fallbacks

use gauntlet_domain::command::{CommandId, CommandRecord, CompletedCommand};
use gauntlet_domain::facts::FactSummary;
use gauntlet_domain::oracle::{OracleCall, OracleFailure, PlanDecision, ThinkDecision};
use gauntlet_domain::safety::RejectionReason;
use gauntlet_domain::session::{FailureRecord, LoopState, RedTeamPhase};

/// Progress notifier for agent execution.
///
/// All methods have default no-op implementations, so implementers only
/// need to override the callbacks they care about.
pub trait AgentProgressNotifier: Send + Sync {
    /// Called when the loop enters a new state
    fn on_loop_state(&self, _state: LoopState) {}

    /// Called when a new cycle begins
    fn on_cycle_start(&self, _cycle: u64) {}

    /// Called when the session advances to the next phase
    fn on_phase_change(&self, _from: RedTeamPhase, _to: RedTeamPhase, _reason: &str) {}

    fn on_think(&self, _decision: &ThinkDecision) {}

    fn on_plan(&self, _decision: &PlanDecision) {}

    /// Called when a rendered command passed the safety validator
    fn on_proposal(&self, _command: &CommandRecord) {}

    fn on_safety_rejection(&self, _command: &str, _reason: &RejectionReason) {}

    fn on_approval_denied(&self, _command: &CommandRecord, _reason: Option<&str>) {}

    fn on_submitted(&self, _id: &CommandId, _command: &str) {}

    fn on_execution_start(&self, _id: &CommandId, _command: &str) {}

    fn on_execution_complete(&self, _command: &CompletedCommand) {}

    /// Called after OBSERVE output was merged, with per-category growth
    fn on_facts_merged(&self, _growth: &FactSummary) {}

    /// Called when the loop returns while a command waits for execution
    fn on_suspended(&self, _id: &CommandId) {}

    fn on_failure(&self, _failure: &FailureRecord) {}

    fn on_done(&self, _reasoning: &str) {}

    // ==================== Oracle Callbacks ====================

    /// Called before retrying a failed oracle call
    fn on_oracle_retry(&self, _call: OracleCall, _attempt: u32, _max: u32, _error: &OracleFailure) {
    }

    /// Called when retries are exhausted and the fallback decision is used
    fn on_oracle_fallback(&self, _call: OracleCall, _error: &OracleFailure) {}
}

/// No-op progress notifier
pub struct NoAgentProgress;

impl AgentProgressNotifier for NoAgentProgress {}
