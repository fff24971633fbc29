//! Agent configuration from TOML (`[agent]` section)

use gauntlet_domain::config::{ApprovalMode, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Raw agent configuration from TOML
///
/// # Example
///
/// ```toml
/// [agent]
/// max_safety_replans = 3     # re-plans per cycle before an intent is given up
/// max_cycles = 25            # cycles per invocation
/// approval = "interactive"   # "interactive" or "auto"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub max_safety_replans: u32,
    pub max_cycles: u32,
    /// How accepted commands are approved: "interactive" or "auto"
    pub approval: String,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            max_safety_replans: 3,
            max_cycles: 25,
            approval: "interactive".to_string(),
        }
    }
}

impl FileAgentConfig {
    /// Parse the approval string, falling back to interactive with a warning.
    pub fn parse_approval_mode(&self) -> (ApprovalMode, Vec<ConfigIssue>) {
        match self.approval.parse::<ApprovalMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "agent.approval".to_string(),
                        value: self.approval.clone(),
                        valid_values: vec!["interactive".to_string(), "auto".to_string()],
                    },
                    format!(
                        "agent.approval: unknown value '{}', falling back to 'interactive'",
                        self.approval
                    ),
                );
                (ApprovalMode::default(), vec![issue])
            }
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.parse_approval_mode().1;
        if self.max_cycles == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "agent.max_cycles".to_string(),
                },
                "agent.max_cycles must be at least 1",
            ));
        }
        issues
    }
}
