//! Rule-based offline oracle.
//!
//! Walks a fixed per-phase playbook of intents, fills template parameters
//! from the facts gathered so far, and reads facts out of the output of the
//! tools it knows (nmap, masscan, hydra, nikto, whatweb, sqlmap). It needs
//! no model and answers instantly, which makes it the default for dry runs
//! and for environments without a reasoning backend.

mod parsers;

use async_trait::async_trait;
use gauntlet_application::OraclePort;
use gauntlet_domain::facts::{FactStore, Service};
use gauntlet_domain::oracle::{
    ObserveDecision, OracleCall, OracleContext, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision,
};
use gauntlet_domain::safety::{Target, extract_targets};
use gauntlet_domain::session::RedTeamPhase;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static GOAL_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3}(?:/\d{1,2})?)\b").expect("valid goal target regex")
});

/// What an intent needs from the fact store before it is worth running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    /// A target from the goal or any known host.
    Target,
    /// A known host, preferably one with no services yet.
    Host,
    /// A host with known services.
    Services,
    Web,
    Ssh,
    Smb,
}

struct Play {
    intent: &'static str,
    tool: &'static str,
    need: Need,
}

const fn play(intent: &'static str, tool: &'static str, need: Need) -> Play {
    Play { intent, tool, need }
}

const RECON: &[Play] = &[
    play("host_discovery", "nmap", Need::Target),
    play("fast_port_scan", "masscan", Need::Target),
    play("web_probe", "curl", Need::Web),
];

const ENUMERATION: &[Play] = &[
    play("port_scan_quick", "nmap", Need::Host),
    play("service_detection", "nmap", Need::Services),
    play("web_fingerprint", "whatweb", Need::Web),
    play("enum_shares", "enum4linux", Need::Smb),
    play("list_shares", "smbclient", Need::Smb),
    play("dir_enum", "gobuster", Need::Web),
];

const VULNERABILITY: &[Play] = &[
    play("web_vuln_scan", "nikto", Need::Web),
    play("test_injection", "sqlmap", Need::Web),
    play("tech_detection", "whatweb", Need::Web),
];

const EXPLOITATION: &[Play] = &[
    play("ssh_brute", "hydra", Need::Ssh),
    play("check_access", "smbclient", Need::Smb),
    play("enumerate_databases", "sqlmap", Need::Web),
];

fn playbook(phase: RedTeamPhase) -> &'static [Play] {
    match phase {
        RedTeamPhase::Recon => RECON,
        RedTeamPhase::Enumeration => ENUMERATION,
        RedTeamPhase::Vulnerability => VULNERABILITY,
        RedTeamPhase::Exploitation => EXPLOITATION,
    }
}

fn need_of(intent: &str) -> Need {
    [RECON, ENUMERATION, VULNERABILITY, EXPLOITATION]
        .iter()
        .flat_map(|plays| plays.iter())
        .find(|p| p.intent == intent)
        .map(|p| p.need)
        .unwrap_or(Need::Target)
}

/// Where the next command should point.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Focus {
    target: Option<String>,
    ports: Option<String>,
    port: Option<u16>,
    url: Option<String>,
}

fn is_web(service: &Service) -> bool {
    let name = service.service.as_deref().unwrap_or_default();
    name.contains("http") || matches!(service.port, 80 | 443 | 8000 | 8080 | 8443)
}

fn is_tls(service: &Service) -> bool {
    let name = service.service.as_deref().unwrap_or_default();
    service.port == 443 || service.port == 8443 || name.contains("ssl") || name.contains("https")
}

fn is_ssh(service: &Service) -> bool {
    service.port == 22 || service.service.as_deref() == Some("ssh")
}

fn is_smb(service: &Service) -> bool {
    let name = service.service.as_deref().unwrap_or_default();
    matches!(service.port, 139 | 445) || name.contains("microsoft-ds") || name.contains("netbios")
}

fn goal_target(goal: &str) -> Option<String> {
    GOAL_TARGET.captures(goal).map(|c| c[1].to_string())
}

fn focus_on_service(service: &Service) -> Focus {
    let url = if is_web(service) {
        let scheme = if is_tls(service) { "https" } else { "http" };
        Some(match (scheme, service.port) {
            ("http", 80) | ("https", 443) => format!("{}://{}", scheme, service.host),
            _ => format!("{}://{}:{}", scheme, service.host, service.port),
        })
    } else {
        None
    };
    Focus {
        target: Some(service.host.clone()),
        port: Some(service.port),
        url,
        ports: None,
    }
}

fn focus(need: Need, goal: &str, facts: &FactStore) -> Option<Focus> {
    let first_service = |matches: fn(&Service) -> bool| {
        facts.services.iter().find(|s| matches(s)).map(focus_on_service)
    };
    match need {
        Need::Target => goal_target(goal)
            .or_else(|| facts.host_addresses().first().map(|h| h.to_string()))
            .map(|target| Focus {
                url: Some(format!("http://{}", target)),
                target: Some(target),
                ..Default::default()
            }),
        Need::Host => {
            let hosts = facts.host_addresses();
            hosts
                .iter()
                .find(|h| facts.services_on(h).next().is_none())
                .or_else(|| hosts.first())
                .map(|h| Focus {
                    target: Some(h.to_string()),
                    url: Some(format!("http://{}", h)),
                    ..Default::default()
                })
        }
        Need::Services => {
            let host = facts.services.iter().next()?.host.clone();
            let ports: Vec<String> = facts
                .services_on(&host)
                .map(|s| s.port.to_string())
                .collect();
            Some(Focus {
                ports: Some(ports.join(",")),
                url: Some(format!("http://{}", host)),
                target: Some(host),
                port: None,
            })
        }
        Need::Web => first_service(is_web),
        Need::Ssh => first_service(is_ssh),
        Need::Smb => first_service(is_smb),
    }
}

/// Whether the session already tried `intent` recently.
fn tried(context: &OracleContext, intent: &str) -> bool {
    context.recent_commands.iter().any(|c| c.intent == intent)
        || context
            .recent_failures
            .iter()
            .any(|f| f.intent.as_deref() == Some(intent))
}

/// Playbook entries of the current phase still worth running.
fn remaining<'a>(context: &'a OracleContext) -> impl Iterator<Item = &'static Play> + 'a {
    playbook(context.phase).iter().filter(move |p| {
        context.tools_available.get(p.tool).copied().unwrap_or(true)
            && !context.unavailable_intents.iter().any(|i| i == p.intent)
            && !tried(context, p.intent)
            && focus(p.need, &context.goal, &context.facts).is_some()
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }

    fn think(&self, context: &OracleContext) -> ThinkDecision {
        let facts = &context.facts;
        if !facts.credentials.is_empty() {
            return ThinkDecision {
                satisfied: true,
                reasoning: format!(
                    "recovered {} credential(s); access achieved",
                    facts.credentials.len()
                ),
                ..ThinkDecision::fallback()
            };
        }

        let summary = format!(
            "{} host(s), {} service(s), {} vulnerability(ies) known",
            facts.hosts.len(),
            facts.services.len(),
            facts.vulnerabilities.len()
        );
        let next = remaining(context).next();
        match (next, context.phase.next()) {
            (Some(play), _) => ThinkDecision {
                satisfied: false,
                should_transition: false,
                transition_reason: None,
                reasoning: format!("{}; {} still applies", summary, play.intent),
                recommended_next_action: Some(play.intent.to_string()),
            },
            (None, Some(next)) => ThinkDecision {
                satisfied: false,
                should_transition: true,
                transition_reason: Some(format!(
                    "nothing left to try in {}; moving to {}",
                    context.phase, next
                )),
                reasoning: summary,
                recommended_next_action: None,
            },
            (None, None) => ThinkDecision {
                satisfied: true,
                should_transition: false,
                transition_reason: None,
                reasoning: format!("{}; no further actions apply", summary),
                recommended_next_action: None,
            },
        }
    }

    fn plan(&self, context: &OracleContext) -> Result<PlanDecision, OracleFailure> {
        let offered = |intent: &str| {
            context
                .available_intents
                .iter()
                .any(|i| i.intent == intent && i.available)
        };
        if let Some(play) = remaining(context).find(|p| offered(p.intent)) {
            let description = context
                .available_intents
                .iter()
                .find(|i| i.intent == play.intent)
                .map(|i| i.description.clone())
                .unwrap_or_default();
            return Ok(PlanDecision {
                objective: objective(play.intent, &description),
                intent: play.intent.to_string(),
                reasoning: format!("next {} step in the {} playbook", play.tool, context.phase),
            });
        }

        let available: Vec<_> = context.available_intents.iter().filter(|i| i.available).collect();
        let choice = available
            .iter()
            .find(|i| !tried(context, &i.intent))
            .or_else(|| available.first())
            .copied()
            .or_else(|| context.available_intents.first())
            .ok_or_else(|| {
                OracleFailure::backend(OracleCall::Plan, "no intents offered for this phase")
            })?;
        Ok(PlanDecision {
            objective: objective(&choice.intent, &choice.description),
            intent: choice.intent.clone(),
            reasoning: "playbook exhausted; trying another offered intent".to_string(),
        })
    }

    fn propose(&self, context: &OracleContext) -> Result<ProposeDecision, OracleFailure> {
        let hint = context.tool.as_ref().ok_or_else(|| {
            OracleFailure::malformed(OracleCall::Propose, "no tool hint in context")
        })?;
        let intent = context.intent.as_deref().unwrap_or_default();
        let focus = focus(need_of(intent), &context.goal, &context.facts).unwrap_or_default();

        let wants = |name: &str| hint.template.contains(&format!("{{{}}}", name));
        let mut decision = ProposeDecision {
            tool: Some(hint.tool.clone()),
            reasoning: format!("{} against {}", intent, focus.target.as_deref().unwrap_or("-")),
            ..Default::default()
        };
        let mut set = |name: &str, value: Option<String>| {
            if let Some(value) = value.filter(|_| wants(name)) {
                decision.parameters.insert(name.to_string(), Value::String(value));
            }
        };
        set("target", focus.target.clone());
        set("ports", focus.ports.clone());
        set("port", focus.port.map(|p| p.to_string()));
        set("url", focus.url.clone());
        set("username", Some("admin".to_string()));
        set("share", Some("IPC$".to_string()));
        Ok(decision)
    }

    fn observe(&self, context: &OracleContext) -> ObserveDecision {
        let Some(output) = &context.output else {
            return ObserveDecision::empty();
        };
        let host = extract_targets(&output.rendered_command)
            .into_iter()
            .find_map(|t| match t {
                Target::Address { ip } => Some(ip.to_string()),
                Target::Hostname { name } => Some(name),
                _ => None,
            });
        let text = format!("{}\n{}", output.stdout, output.stderr);
        let facts = parsers::parse(&output.tool, &text, host.as_deref());
        let summary = format!(
            "{}: {} host(s), {} service(s), {} vulnerability(ies), {} credential(s), {} technology(ies)",
            output.tool,
            facts.hosts.len(),
            facts.services.len(),
            facts.vulnerabilities.len(),
            facts.credentials.len(),
            facts.technologies.len()
        );
        ObserveDecision {
            facts,
            success: Some(output.success),
            summary,
        }
    }
}

fn objective(intent: &str, description: &str) -> String {
    if description.is_empty() {
        format!("Run {}", intent)
    } else {
        format!("{} ({})", description, intent)
    }
}

#[async_trait]
impl OraclePort for HeuristicOracle {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn think(&self, context: &OracleContext) -> Result<ThinkDecision, OracleFailure> {
        Ok(HeuristicOracle::think(self, context))
    }

    async fn plan(&self, context: &OracleContext) -> Result<PlanDecision, OracleFailure> {
        HeuristicOracle::plan(self, context)
    }

    async fn propose(&self, context: &OracleContext) -> Result<ProposeDecision, OracleFailure> {
        HeuristicOracle::propose(self, context)
    }

    async fn observe(&self, context: &OracleContext) -> Result<ObserveDecision, OracleFailure> {
        Ok(HeuristicOracle::observe(self, context))
    }
}
