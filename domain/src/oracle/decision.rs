//! Typed decisions returned by the four oracle calls.

use crate::facts::ObservedFacts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Which oracle call is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleCall {
    Think,
    Plan,
    Propose,
    Observe,
}

impl OracleCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleCall::Think => "think",
            OracleCall::Plan => "plan",
            OracleCall::Propose => "propose",
            OracleCall::Observe => "observe",
        }
    }
}

impl std::fmt::Display for OracleCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a single oracle call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleFailure {
    #[error("{call} call timed out after {after_ms}ms")]
    Timeout { call: OracleCall, after_ms: u64 },

    #[error("{call} response malformed: {reason}")]
    Malformed { call: OracleCall, reason: String },

    #[error("{call} backend error: {message}")]
    Backend { call: OracleCall, message: String },
}

impl OracleFailure {
    pub fn malformed(call: OracleCall, reason: impl Into<String>) -> Self {
        Self::Malformed {
            call,
            reason: reason.into(),
        }
    }

    pub fn backend(call: OracleCall, message: impl Into<String>) -> Self {
        Self::Backend {
            call,
            message: message.into(),
        }
    }

    pub fn call(&self) -> OracleCall {
        match self {
            Self::Timeout { call, .. } | Self::Malformed { call, .. } | Self::Backend { call, .. } => {
                *call
            }
        }
    }
}

/// A decision shape that can be checked after deserialization.
pub trait Decision: serde::de::DeserializeOwned {
    const CALL: OracleCall;

    /// Reject structurally valid JSON that carries no usable decision.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// THINK: is the goal met, and should the phase advance?
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkDecision {
    #[serde(alias = "goal_satisfied")]
    pub satisfied: bool,
    #[serde(default, alias = "should_transition_phase")]
    pub should_transition: bool,
    #[serde(default)]
    pub transition_reason: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub recommended_next_action: Option<String>,
}

impl ThinkDecision {
    /// Conservative answer used when the oracle cannot be reached.
    pub fn fallback() -> Self {
        Self {
            satisfied: false,
            should_transition: false,
            transition_reason: None,
            reasoning: "oracle unavailable; continuing in the current phase".to_string(),
            recommended_next_action: None,
        }
    }
}

impl Decision for ThinkDecision {
    const CALL: OracleCall = OracleCall::Think;
}

/// PLAN: the next objective and the intent that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDecision {
    pub objective: String,
    pub intent: String,
    #[serde(default, alias = "rationale")]
    pub reasoning: String,
}

impl PlanDecision {
    pub fn new(objective: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            intent: intent.into(),
            reasoning: String::new(),
        }
    }
}

impl Decision for PlanDecision {
    const CALL: OracleCall = OracleCall::Plan;

    fn check(&self) -> Result<(), String> {
        if self.intent.trim().is_empty() {
            return Err("intent is empty".to_string());
        }
        if self.objective.trim().is_empty() {
            return Err("objective is empty".to_string());
        }
        Ok(())
    }
}

/// PROPOSE: parameters for the planned intent's template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposeDecision {
    /// Tool the oracle had in mind; informational only.
    #[serde(default, alias = "tool_name")]
    pub tool: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub expected_outcome: Option<String>,
}

impl ProposeDecision {
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

impl Decision for ProposeDecision {
    const CALL: OracleCall = OracleCall::Propose;
}

/// OBSERVE: facts extracted from one command's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObserveDecision {
    #[serde(flatten)]
    pub facts: ObservedFacts,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub summary: String,
}

impl ObserveDecision {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Decision for ObserveDecision {
    const CALL: OracleCall = OracleCall::Observe;
}
