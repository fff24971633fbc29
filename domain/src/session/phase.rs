//! Red-team phases and agent loop states.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse stage of the red-team workflow.
///
/// Phases only move forward. [`RedTeamPhase::advance`] caps at
/// [`RedTeamPhase::Exploitation`] and never wraps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RedTeamPhase {
    #[default]
    Recon,
    Enumeration,
    Vulnerability,
    Exploitation,
}

impl RedTeamPhase {
    pub const ALL: [RedTeamPhase; 4] = [
        RedTeamPhase::Recon,
        RedTeamPhase::Enumeration,
        RedTeamPhase::Vulnerability,
        RedTeamPhase::Exploitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RedTeamPhase::Recon => "recon",
            RedTeamPhase::Enumeration => "enumeration",
            RedTeamPhase::Vulnerability => "vulnerability",
            RedTeamPhase::Exploitation => "exploitation",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RedTeamPhase::Recon => "Reconnaissance",
            RedTeamPhase::Enumeration => "Enumeration",
            RedTeamPhase::Vulnerability => "Vulnerability Analysis",
            RedTeamPhase::Exploitation => "Exploitation",
        }
    }

    /// The following phase, or `None` at the last one.
    pub fn next(&self) -> Option<RedTeamPhase> {
        match self {
            RedTeamPhase::Recon => Some(RedTeamPhase::Enumeration),
            RedTeamPhase::Enumeration => Some(RedTeamPhase::Vulnerability),
            RedTeamPhase::Vulnerability => Some(RedTeamPhase::Exploitation),
            RedTeamPhase::Exploitation => None,
        }
    }

    /// The following phase, capped at `Exploitation`.
    pub fn advance(&self) -> RedTeamPhase {
        self.next().unwrap_or(*self)
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for RedTeamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RedTeamPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recon" | "reconnaissance" => Ok(RedTeamPhase::Recon),
            "enumeration" | "enum" => Ok(RedTeamPhase::Enumeration),
            "vulnerability" | "vulnerability_scan" | "vuln" => Ok(RedTeamPhase::Vulnerability),
            "exploitation" | "exploit" => Ok(RedTeamPhase::Exploitation),
            other => Err(DomainError::InvalidPhase(other.to_string())),
        }
    }
}

/// State of the agent loop's state machine.
///
/// ```text
/// Thinking -> Planning -> Proposing -> AwaitingApproval -> AwaitingExecution
///     ^                                                          |
///     +------------------------ Observing <----------------------+
///
/// Thinking -> Done (goal satisfied)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Thinking,
    Planning,
    Proposing,
    AwaitingApproval,
    AwaitingExecution,
    Observing,
    Done,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Thinking => "thinking",
            LoopState::Planning => "planning",
            LoopState::Proposing => "proposing",
            LoopState::AwaitingApproval => "awaiting_approval",
            LoopState::AwaitingExecution => "awaiting_execution",
            LoopState::Observing => "observing",
            LoopState::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done)
    }

    /// States at which the loop hands control back to its caller.
    pub fn is_suspension_point(&self) -> bool {
        matches!(self, LoopState::AwaitingApproval | LoopState::AwaitingExecution)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_advances_forward_and_caps() {
        assert_eq!(RedTeamPhase::Recon.advance(), RedTeamPhase::Enumeration);
        assert_eq!(RedTeamPhase::Enumeration.advance(), RedTeamPhase::Vulnerability);
        assert_eq!(RedTeamPhase::Vulnerability.advance(), RedTeamPhase::Exploitation);
        assert_eq!(RedTeamPhase::Exploitation.advance(), RedTeamPhase::Exploitation);
        assert!(RedTeamPhase::Exploitation.is_last());
    }

    #[test]
    fn test_phase_ordering_is_monotonic() {
        let mut sorted = RedTeamPhase::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, RedTeamPhase::ALL.to_vec());
    }

    #[test]
    fn test_phase_parse_aliases() {
        assert_eq!("reconnaissance".parse::<RedTeamPhase>().unwrap(), RedTeamPhase::Recon);
        assert_eq!(
            "vulnerability_scan".parse::<RedTeamPhase>().unwrap(),
            RedTeamPhase::Vulnerability
        );
        assert!("post_exploitation".parse::<RedTeamPhase>().is_err());
    }

    #[test]
    fn test_phase_serde_snake_case() {
        let json = serde_json::to_string(&RedTeamPhase::Exploitation).unwrap();
        assert_eq!(json, "\"exploitation\"");
    }

    #[test]
    fn test_loop_state_suspension_points() {
        assert!(LoopState::AwaitingApproval.is_suspension_point());
        assert!(LoopState::AwaitingExecution.is_suspension_point());
        assert!(!LoopState::Thinking.is_suspension_point());
        assert!(LoopState::Done.is_terminal());
    }
}
