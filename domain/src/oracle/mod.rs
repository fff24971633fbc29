//! Oracle domain module
//!
//! The oracle is the external reasoning backend. Each of its four calls
//! (THINK, PLAN, PROPOSE, OBSERVE) gets an [`OracleContext`] and must answer
//! with JSON matching one decision type. Responses are validated here, at the
//! boundary, so the agent loop only ever sees typed decisions or an
//! [`OracleFailure`].

pub mod context;
pub mod decision;
pub mod parsing;

pub use context::{CommandDigest, ObservedOutput, OracleContext, ToolHint};
pub use decision::{
    Decision, ObserveDecision, OracleCall, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision,
};
pub use parsing::{decision_from_value, extract_json, parse_decision};
