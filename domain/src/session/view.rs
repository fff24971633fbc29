//! Read-only projections of a session for report consumers and resume.

use super::entities::{FailureRecord, PhaseTransition, Session};
use super::phase::{LoopState, RedTeamPhase};
use crate::command::{CommandId, CommandRecord, CommandStatus};
use crate::facts::{FactStore, FactSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fully resolved snapshot of a session.
///
/// Everything a report needs is already here; nothing has to be recomputed
/// from the raw aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub goal: String,
    pub phase: RedTeamPhase,
    pub loop_state: LoopState,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cycle: u64,
    pub current_objective: Option<String>,
    pub pending_command: Option<CommandId>,
    pub summary: FactSummary,
    pub facts: FactStore,
    pub commands: Vec<CommandRecord>,
    pub failures: Vec<FailureRecord>,
    pub phase_history: Vec<PhaseTransition>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.to_string(),
            goal: session.goal.clone(),
            phase: session.phase,
            loop_state: session.loop_state,
            done: session.is_done(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            cycle: session.cycle,
            current_objective: session.current_objective.clone(),
            pending_command: session.pending_command.clone(),
            summary: session.facts.summary(),
            facts: session.facts.clone(),
            commands: session.commands().to_vec(),
            failures: session.failures().to_vec(),
            phase_history: session.phase_history().to_vec(),
        }
    }
}

impl SessionView {
    pub fn successful_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.outcome().is_some_and(|o| o.success))
            .count()
    }
}

/// Short summary of where a session stands, shown on resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeContext {
    pub session_id: String,
    pub goal: String,
    pub phase: RedTeamPhase,
    pub loop_state: LoopState,
    pub cycle: u64,
    pub summary: FactSummary,
    pub commands: usize,
    pub failures: usize,
    pub last_command: Option<LastCommand>,
    pub pending_command: Option<CommandId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCommand {
    pub id: CommandId,
    pub rendered_command: String,
    pub status: CommandStatus,
    pub success: Option<bool>,
}

impl Session {
    pub fn view(&self) -> SessionView {
        SessionView::from(self)
    }

    pub fn resume_context(&self) -> ResumeContext {
        ResumeContext {
            session_id: self.session_id.to_string(),
            goal: self.goal.clone(),
            phase: self.phase,
            loop_state: self.loop_state,
            cycle: self.cycle,
            summary: self.facts.summary(),
            commands: self.commands().len(),
            failures: self.failures().len(),
            last_command: self.last_command().map(|c| LastCommand {
                id: c.id.clone(),
                rendered_command: c.rendered_command.clone(),
                status: c.status(),
                success: c.outcome().map(|o| o.success),
            }),
            pending_command: self.pending_command.clone(),
        }
    }
}

impl std::fmt::Display for ResumeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session: {}", self.session_id)?;
        writeln!(f, "Goal: {}", self.goal)?;
        writeln!(
            f,
            "Phase: {} ({}), cycle {}",
            self.phase.display_name(),
            self.loop_state,
            self.cycle
        )?;
        writeln!(f, "Facts: {}", self.summary)?;
        writeln!(
            f,
            "Commands: {} executed, {} failures recorded",
            self.commands, self.failures
        )?;
        if let Some(last) = &self.last_command {
            let result = match last.success {
                Some(true) => "ok",
                Some(false) => "failed",
                None => last.status.as_str(),
            };
            writeln!(f, "Last: {} `{}` [{}]", last.id, last.rendered_command, result)?;
        }
        if let Some(pending) = &self.pending_command {
            writeln!(f, "Waiting on: {}", pending)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ObservedFacts, merge};

    #[test]
    fn test_view_reflects_session() {
        let mut session = Session::with_id("s1", "enumerate 192.168.1.0/24");
        session.facts = merge(
            &session.facts,
            &ObservedFacts::hosts(["192.168.1.1", "192.168.1.10"]),
        );
        let id = session.next_command_id();
        session
            .add_command(CommandRecord::new(
                id,
                "nmap",
                "host_discovery",
                "nmap -sn 192.168.1.0/24",
                RedTeamPhase::Recon,
            ))
            .unwrap();

        let view = session.view();
        assert_eq!(view.summary.hosts, 2);
        assert_eq!(view.commands.len(), 1);
        assert_eq!(view.successful_commands(), 0);
        assert!(!view.done);
    }

    #[test]
    fn test_resume_context_mentions_pending() {
        let mut session = Session::with_id("s1", "goal");
        let id = session.next_command_id();
        session
            .add_command(CommandRecord::new(
                id.clone(),
                "nmap",
                "host_discovery",
                "nmap -sn 10.0.0.0/24",
                RedTeamPhase::Recon,
            ))
            .unwrap();
        session.pending_command = Some(id);
        session.loop_state = LoopState::AwaitingExecution;

        let ctx = session.resume_context();
        let text = ctx.to_string();
        assert!(text.contains("Waiting on: cmd-0001"));
        assert!(text.contains("[pending]"));
    }
}
