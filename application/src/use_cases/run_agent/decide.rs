//! THINKING, PLANNING and PROPOSING handlers.

use super::types::{Step, StopReason};
use super::RunAgentUseCase;
use crate::ports::agent_progress::AgentProgressNotifier;
use gauntlet_domain::command::CommandRecord;
use gauntlet_domain::oracle::{OracleCall, OracleContext, PlanDecision};
use gauntlet_domain::safety::Verdict;
use gauntlet_domain::session::{FailureKind, LoopState, Session};
use gauntlet_domain::tool::IntentSummary;
use serde_json::json;
use tracing::{debug, info};

impl RunAgentUseCase {
    pub(super) async fn think(
        &self,
        session: &mut Session,
        progress: &dyn AgentProgressNotifier,
    ) -> Step {
        let context = OracleContext::think(session);
        let answer = self.oracle.think(&context, progress).await;
        self.note_oracle(session, OracleCall::Think, &answer, progress);
        let decision = answer.value;

        progress.on_think(&decision);
        self.log_event(
            session,
            "think",
            json!({
                "satisfied": decision.satisfied,
                "should_transition": decision.should_transition,
                "reasoning": decision.reasoning,
                "degraded": answer.degraded.is_some(),
            }),
        );
        session.last_reasoning = Some(decision.reasoning.clone());

        if decision.satisfied {
            session.mark_done(decision.reasoning.clone());
            info!(session_id = %session.id(), phase = %session.phase, "Goal satisfied");
            progress.on_done(&decision.reasoning);
            return Step::Stop(StopReason::Done);
        }

        if decision.should_transition {
            let from = session.phase;
            let reason = decision
                .transition_reason
                .clone()
                .unwrap_or_else(|| decision.reasoning.clone());
            match session.transition_phase(reason.clone()).map(|t| t.to) {
                Some(to) => {
                    info!(session_id = %session.id(), from = %from, to = %to, "Phase advanced");
                    self.log_event(
                        session,
                        "phase_transition",
                        json!({ "from": from.as_str(), "to": to.as_str(), "reason": reason }),
                    );
                    progress.on_phase_change(from, to, &reason);
                }
                None => debug!(session_id = %session.id(), "Already in the last phase"),
            }
        }

        session.set_loop_state(LoopState::Planning);
        Step::Continue
    }

    pub(super) async fn plan(
        &self,
        session: &mut Session,
        progress: &dyn AgentProgressNotifier,
    ) -> Step {
        let offered: Vec<IntentSummary> = self
            .catalog
            .intents_for_phase(session.phase)
            .into_iter()
            .filter(|i| !session.unavailable_intents.contains(&i.intent))
            .collect();
        if offered.is_empty() {
            let reason = format!("no usable intents left in phase {}", session.phase);
            return self.end_cycle(session, FailureKind::ReplanExhausted, reason, progress);
        }

        // Prefer an intent whose tool is installed.
        let fallback = offered
            .iter()
            .find(|i| i.available)
            .or_else(|| offered.first())
            .map(|i| {
                let mut plan = PlanDecision::new(format!("{} (fallback)", i.description), &i.intent);
                plan.reasoning = "oracle unavailable; first offered intent".to_string();
                plan
            });

        let context = OracleContext::plan(session, offered.clone());
        let answer = self
            .oracle
            .plan(&context, move || fallback, progress)
            .await;
        self.note_oracle(session, OracleCall::Plan, &answer, progress);

        let Some(decision) = answer.value else {
            let reason = "no plan available".to_string();
            return self.end_cycle(session, FailureKind::OracleFailure, reason, progress);
        };

        if session.unavailable_intents.contains(&decision.intent) {
            let reason = format!(
                "intent '{}' was given up this cycle and planned again",
                decision.intent
            );
            session.current_intent = Some(decision.intent);
            return self.end_cycle(session, FailureKind::ReplanExhausted, reason, progress);
        }

        session.current_objective = Some(decision.objective.clone());
        session.current_intent = Some(decision.intent.clone());

        if !offered.iter().any(|i| i.intent == decision.intent) {
            let reason = format!(
                "intent '{}' is not offered in phase {}",
                decision.intent, session.phase
            );
            return self.replan(session, FailureKind::ProposalInvalid, reason, None, progress);
        }

        info!(
            session_id = %session.id(),
            phase = %session.phase,
            intent = %decision.intent,
            objective = %decision.objective,
            "Planned"
        );
        self.log_event(
            session,
            "plan",
            json!({ "objective": decision.objective, "intent": decision.intent }),
        );
        progress.on_plan(&decision);
        session.set_loop_state(LoopState::Proposing);
        Step::Continue
    }

    pub(super) async fn propose(
        &self,
        session: &mut Session,
        progress: &dyn AgentProgressNotifier,
    ) -> Step {
        let Some(intent) = session.current_intent.clone() else {
            session.set_loop_state(LoopState::Planning);
            return Step::Continue;
        };
        let Some(resolved) = self.catalog.resolve(&intent) else {
            let reason = format!("no tool provides intent '{}'", intent);
            return self.replan(session, FailureKind::ProposalInvalid, reason, None, progress);
        };

        let context = OracleContext::propose(session, &resolved);
        let answer = self.oracle.propose(&context, progress).await;
        self.note_oracle(session, OracleCall::Propose, &answer, progress);

        let Some(decision) = answer.value else {
            let reason = format!("no proposal for intent '{}'", intent);
            return self.replan(session, FailureKind::ProposalInvalid, reason, None, progress);
        };

        let rendered = match resolved.render(&decision.parameters) {
            Ok(rendered) => rendered,
            Err(e) => {
                return self.replan(
                    session,
                    FailureKind::ProposalInvalid,
                    e.to_string(),
                    None,
                    progress,
                );
            }
        };

        if let Verdict::Rejected(reason) = self.policy.validate(&rendered) {
            progress.on_safety_rejection(&rendered, &reason);
            self.log_event(
                session,
                "safety_rejected",
                json!({ "command": rendered, "reason": reason.tag(), "detail": reason.to_string() }),
            );
            let message = format!("{}: {}", reason.tag(), reason);
            return self.replan(
                session,
                FailureKind::SafetyRejection,
                message,
                Some(rendered),
                progress,
            );
        }

        let id = session.next_command_id();
        let record = CommandRecord::new(id, &resolved.tool, &intent, &rendered, session.phase)
            .with_parameters(decision.parameters)
            .with_reasoning(decision.reasoning);

        info!(
            session_id = %session.id(),
            command_id = %record.id,
            tool = %record.tool,
            command = %record.rendered_command,
            "Command proposed"
        );
        self.log_event(
            session,
            "proposed",
            json!({ "command_id": record.id.as_str(), "tool": record.tool, "command": record.rendered_command }),
        );
        progress.on_proposal(&record);

        session.proposal = Some(record);
        session.set_loop_state(LoopState::AwaitingApproval);
        Step::Continue
    }
}
