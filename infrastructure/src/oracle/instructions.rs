//! Response contracts sent alongside each oracle context.

use gauntlet_domain::oracle::OracleCall;

const THINK: &str = r#"Assess progress toward the goal. Answer with one JSON object:
{"goal_satisfied": bool, "should_transition_phase": bool, "transition_reason": string|null,
 "recommended_next_action": string|null, "reasoning": string}
Phases only move forward: recon -> enumeration -> vulnerability -> exploitation."#;

const PLAN: &str = r#"Choose the next objective and exactly one intent from "available_intents".
Answer with one JSON object: {"objective": string, "intent": string, "rationale": string}"#;

const PROPOSE: &str = r#"Fill the parameters of the planned intent's template (see "tool").
Every name in "required_params" must be present. Targets must stay inside the engagement scope.
Answer with one JSON object:
{"tool_name": string, "parameters": {name: string|number|[string]}, "reasoning": string,
 "expected_outcome": string}"#;

const OBSERVE: &str = r#"Extract facts from the command output in "output". Report only what the output shows.
Answer with one JSON object:
{"hosts": [{"ip": string, "hostname": string|null, "os": string|null}],
 "services": [{"host": string, "port": number, "protocol": "tcp"|"udp", "service": string|null, "version": string|null}],
 "vulnerabilities": [{"cve": string|null, "kind": string, "severity": "low"|"medium"|"high"|"critical", "host": string|null, "port": number|null, "description": string|null}],
 "credentials": [{"username": string, "secret": string, "target": string, "service": string|null}],
 "technologies": [{"name": string, "version": string|null, "host": string|null}],
 "success": bool, "summary": string}"#;

/// Response contract for `call`.
pub fn instructions(call: OracleCall) -> &'static str {
    match call {
        OracleCall::Think => THINK,
        OracleCall::Plan => PLAN,
        OracleCall::Propose => PROPOSE,
        OracleCall::Observe => OBSERVE,
    }
}
