//! Approval mode value object

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the human approval gate is satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Ask on the terminal for every accepted command (default)
    #[default]
    Interactive,
    /// Approve every command the safety validator accepted
    Auto,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Interactive => "interactive",
            ApprovalMode::Auto => "auto",
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interactive" | "ask" => Ok(ApprovalMode::Interactive),
            "auto" | "auto-approve" | "auto_approve" => Ok(ApprovalMode::Auto),
            other => Err(format!("unknown approval mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_interactive() {
        assert_eq!(ApprovalMode::default(), ApprovalMode::Interactive);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("AUTO".parse::<ApprovalMode>(), Ok(ApprovalMode::Auto));
        assert_eq!("ask".parse::<ApprovalMode>(), Ok(ApprovalMode::Interactive));
        assert!("sometimes".parse::<ApprovalMode>().is_err());
    }
}
