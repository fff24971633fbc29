//! Boundary parsing of oracle responses.
//!
//! Oracles answer in text that should be a single JSON object. Models wrap it
//! in prose or fenced blocks often enough that extraction tries, in order:
//!
//! 1. the whole response as JSON
//! 2. the first ` ```json ` (or bare ` ``` `) fenced block that parses
//! 3. the span from the first `{` to the last `}`
//!
//! Anything that still fails to parse or to match the decision's shape becomes
//! an [`OracleFailure::Malformed`].

use super::decision::{Decision, OracleFailure};

/// Pull the first JSON object out of a model response.
pub fn extract_json(response: &str) -> Option<serde_json::Value> {
    let trimmed = response.trim();
    if let Some(object) = parse_object(trimmed) {
        return Some(object);
    }

    let mut in_block = false;
    let mut current_block = String::new();
    for line in trimmed.lines() {
        let line_trimmed = line.trim();
        if !in_block && line_trimmed.starts_with("```") {
            in_block = true;
            current_block.clear();
        } else if in_block && line_trimmed == "```" {
            in_block = false;
            if let Some(object) = parse_object(&current_block) {
                return Some(object);
            }
        } else if in_block {
            current_block.push_str(line);
            current_block.push('\n');
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&trimmed[start..=end])
}

fn parse_object(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .filter(|v| v.is_object())
}

/// Parse a response into the decision type `D`.
pub fn parse_decision<D: Decision>(response: &str) -> Result<D, OracleFailure> {
    let value = extract_json(response)
        .ok_or_else(|| OracleFailure::malformed(D::CALL, "no JSON object in response"))?;
    decision_from_value(value)
}

/// Convert an already-parsed JSON value into the decision type `D`.
pub fn decision_from_value<D: Decision>(value: serde_json::Value) -> Result<D, OracleFailure> {
    let decision: D = serde_json::from_value(value)
        .map_err(|e| OracleFailure::malformed(D::CALL, e.to_string()))?;
    decision
        .check()
        .map_err(|reason| OracleFailure::malformed(D::CALL, reason))?;
    Ok(decision)
}
