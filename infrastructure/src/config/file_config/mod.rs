//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every field has a default, so an empty file is a valid configuration.

mod agent;
mod execution;
mod oracle;
mod safety;
mod storage;
mod tools;

pub use agent::FileAgentConfig;
pub use execution::{FileExecutionConfig, execution_params};
pub use oracle::{FileOracleConfig, OracleBackend};
pub use safety::FileSafetyConfig;
pub use storage::FileStorageConfig;
pub use tools::FileToolsConfig;

use gauntlet_application::ExecutionParams;
use gauntlet_domain::config::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub agent: FileAgentConfig,
    pub oracle: FileOracleConfig,
    pub execution: FileExecutionConfig,
    pub safety: FileSafetyConfig,
    pub storage: FileStorageConfig,
    pub tools: FileToolsConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Errors make the configuration unusable; warnings are logged and the
    /// affected field falls back to its default.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.agent.validate());
        issues.extend(self.oracle.validate());
        issues.extend(self.execution.validate());
        issues.extend(self.safety.validate());
        issues.extend(self.storage.validate());
        issues.extend(self.tools.validate());
        issues
    }

    pub fn execution_params(&self) -> ExecutionParams {
        execution_params(&self.agent, &self.execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_domain::config::ApprovalMode;
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[agent]
max_cycles = 10
approval = "auto"

[oracle]
backend = "process"
command = "python3 oracle.py --model local"
max_attempts = 2

[execution]
command_timeout_secs = 300

[safety]
allowed_networks = ["192.168.1.0/24"]
deny_patterns = ["\\bnc\\s+-e\\b"]

[storage]
backup_retention = 3

[tools]
disabled = ["hydra"]
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.max_cycles, 10);
        assert_eq!(config.agent.parse_approval_mode().0, ApprovalMode::Auto);
        assert_eq!(config.oracle.parse_backend().0, OracleBackend::Process);
        assert_eq!(config.oracle.to_retry_policy().max_attempts, 2);
        assert_eq!(config.storage.backup_retention, 3);
        assert_eq!(config.tools.disabled, vec!["hydra".to_string()]);
        assert_eq!(
            config.execution_params().command_timeout,
            Duration::from_secs(300)
        );
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: FileConfig = toml::from_str("[agent]\nmax_safety_replans = 5\n").unwrap();
        assert_eq!(config.agent.max_safety_replans, 5);
        // Defaults should apply
        assert_eq!(config.agent.max_cycles, 25);
        assert!(config.safety.require_approval);
        assert_eq!(config.oracle, FileOracleConfig::default());
    }

    #[test]
    fn test_validate_default_config() {
        assert!(FileConfig::default().validate().is_empty());
    }

    #[test]
    fn test_validate_collects_across_sections() {
        let config: FileConfig = toml::from_str(
            r#"
[agent]
approval = "sometimes"

[safety]
allowed_networks = ["not a network!"]
"#,
        )
        .unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(ConfigIssue::has_errors(&issues));
    }
}
