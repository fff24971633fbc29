//! Structured context handed to the oracle for each call.

use super::decision::OracleCall;
use crate::command::{CommandId, CommandRecord, CommandStatus, CompletedCommand};
use crate::core::string::truncate;
use crate::facts::{FactStore, FactSummary};
use crate::session::{FailureRecord, RedTeamPhase, Session};
use crate::tool::{IntentSummary, ResolvedIntent};
use serde::Serialize;
use std::collections::BTreeMap;

const RECENT_COMMANDS: usize = 5;
const RECENT_FAILURES: usize = 5;

/// Compact form of a command for history listings.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDigest {
    pub id: CommandId,
    pub intent: String,
    pub rendered_command: String,
    pub status: CommandStatus,
    pub success: Option<bool>,
    pub exit_code: Option<i32>,
}

impl From<&CommandRecord> for CommandDigest {
    fn from(record: &CommandRecord) -> Self {
        let outcome = record.outcome();
        Self {
            id: record.id.clone(),
            intent: record.intent.clone(),
            rendered_command: record.rendered_command.clone(),
            status: record.status(),
            success: outcome.map(|o| o.success),
            exit_code: outcome.and_then(|o| o.exit_code),
        }
    }
}

/// Template the proposal must fill.
#[derive(Debug, Clone, Serialize)]
pub struct ToolHint {
    pub tool: String,
    pub template: String,
    pub required_params: Vec<String>,
    pub defaults: BTreeMap<String, String>,
}

impl From<&ResolvedIntent> for ToolHint {
    fn from(resolved: &ResolvedIntent) -> Self {
        Self {
            tool: resolved.tool.clone(),
            template: resolved.template.template.clone(),
            required_params: resolved.template.required_params.clone(),
            defaults: resolved.template.defaults.clone(),
        }
    }
}

/// Output of the command being observed, clipped for the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ObservedOutput {
    pub id: CommandId,
    pub tool: String,
    pub rendered_command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub failure: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

/// Everything an oracle call may need, serialized as one JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct OracleContext {
    pub call: OracleCall,
    pub session_id: String,
    pub goal: String,
    pub phase: RedTeamPhase,
    pub cycle: u64,
    pub summary: FactSummary,
    pub facts: FactStore,
    pub recent_commands: Vec<CommandDigest>,
    pub recent_failures: Vec<FailureRecord>,
    pub tools_available: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_intents: Vec<IntentSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable_intents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ObservedOutput>,
}

impl OracleContext {
    fn base(call: OracleCall, session: &Session) -> Self {
        let commands = session.commands();
        let failures = session.failures();
        Self {
            call,
            session_id: session.session_id.to_string(),
            goal: session.goal.clone(),
            phase: session.phase,
            cycle: session.cycle,
            summary: session.facts.summary(),
            facts: session.facts.clone(),
            recent_commands: commands
                .iter()
                .skip(commands.len().saturating_sub(RECENT_COMMANDS))
                .map(CommandDigest::from)
                .collect(),
            recent_failures: failures
                .iter()
                .skip(failures.len().saturating_sub(RECENT_FAILURES))
                .cloned()
                .collect(),
            tools_available: session.tools_available.clone(),
            objective: session.current_objective.clone(),
            intent: session.current_intent.clone(),
            available_intents: Vec::new(),
            unavailable_intents: Vec::new(),
            tool: None,
            output: None,
        }
    }

    pub fn think(session: &Session) -> Self {
        Self::base(OracleCall::Think, session)
    }

    /// PLAN context; `intents` are the phase's intents minus those given up
    /// on this cycle.
    pub fn plan(session: &Session, intents: Vec<IntentSummary>) -> Self {
        let mut context = Self::base(OracleCall::Plan, session);
        context.available_intents = intents
            .into_iter()
            .filter(|i| !session.unavailable_intents.contains(&i.intent))
            .collect();
        context.unavailable_intents = session.unavailable_intents.iter().cloned().collect();
        context
    }

    pub fn propose(session: &Session, resolved: &ResolvedIntent) -> Self {
        let mut context = Self::base(OracleCall::Propose, session);
        context.tool = Some(ToolHint::from(resolved));
        context
    }

    pub fn observe(session: &Session, command: &CompletedCommand, max_output: usize) -> Self {
        let mut context = Self::base(OracleCall::Observe, session);
        let outcome = &command.outcome;
        context.intent = Some(command.intent.clone());
        context.output = Some(ObservedOutput {
            id: command.id.clone(),
            tool: command.tool.clone(),
            rendered_command: command.rendered_command.clone(),
            success: outcome.success,
            exit_code: outcome.exit_code,
            failure: outcome
                .failure
                .as_ref()
                .and_then(|f| serde_json::to_value(f).ok())
                .map(|v| v.to_string()),
            stdout: truncate(&outcome.stdout, max_output),
            stderr: truncate(&outcome.stderr, max_output),
        });
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutcome, CommandRecord};
    use crate::tool::{IntentTemplate, ToolCatalog, ToolCategory, ToolDescriptor};

    fn session_with_commands(count: u64) -> Session {
        let mut session = Session::new("enumerate 192.168.1.0/24");
        for _ in 0..count {
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
        }
        session
    }

    #[test]
    fn test_recent_commands_are_capped() {
        let session = session_with_commands(8);
        let context = OracleContext::think(&session);
        assert_eq!(context.recent_commands.len(), RECENT_COMMANDS);
        assert_eq!(context.recent_commands[0].id.as_str(), "cmd-0004");
    }

    #[test]
    fn test_plan_context_hides_unavailable_intents() {
        let mut catalog = ToolCatalog::new();
        catalog.register(
            ToolDescriptor::new("nmap", ToolCategory::Discovery)
                .with_phases(&[RedTeamPhase::Recon])
                .with_intent(IntentTemplate::new("host_discovery", "nmap -sn {target}"))
                .with_intent(IntentTemplate::new("port_scan_quick", "nmap -sS {target}")),
        );
        let mut session = session_with_commands(0);
        session.mark_intent_unavailable("host_discovery");

        let context = OracleContext::plan(&session, catalog.intents_for_phase(RedTeamPhase::Recon));
        assert_eq!(context.available_intents.len(), 1);
        assert_eq!(context.available_intents[0].intent, "port_scan_quick");
        assert_eq!(context.unavailable_intents, vec!["host_discovery"]);

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["call"], "plan");
        assert!(json.get("output").is_none());
    }

    #[test]
    fn test_observe_context_clips_output() {
        let session = session_with_commands(0);
        let command = CompletedCommand {
            id: "cmd-0001".into(),
            tool: "nmap".into(),
            intent: "host_discovery".into(),
            rendered_command: "nmap -sn 192.168.1.0/24".into(),
            outcome: CommandOutcome::from_exit("x".repeat(500), String::new(), 0, 12),
        };
        let context = OracleContext::observe(&session, &command, 100);
        let output = context.output.unwrap();
        assert!(output.stdout.len() <= 100);
        assert!(output.success);
        assert_eq!(context.intent.as_deref(), Some("host_discovery"));
    }
}
