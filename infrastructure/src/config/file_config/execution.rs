//! Execution configuration from TOML (`[execution]` section)

use gauntlet_application::ExecutionParams;
use gauntlet_domain::config::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw execution configuration from TOML
///
/// # Example
///
/// ```toml
/// [execution]
/// command_timeout_secs = 600
/// max_pending = 1
/// poll_interval_ms = 2000
/// output_cap_bytes = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub command_timeout_secs: u64,
    /// Submitted-but-not-run commands allowed per session
    pub max_pending: usize,
    pub poll_interval_ms: u64,
    /// Cap on each captured output stream
    pub output_cap_bytes: usize,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        let params = ExecutionParams::default();
        Self {
            command_timeout_secs: params.command_timeout.as_secs(),
            max_pending: params.max_pending,
            poll_interval_ms: params.poll_interval.as_millis() as u64,
            output_cap_bytes: params.output_cap_bytes,
        }
    }
}

impl FileExecutionConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        [
            ("execution.command_timeout_secs", self.command_timeout_secs == 0),
            ("execution.max_pending", self.max_pending == 0),
            ("execution.output_cap_bytes", self.output_cap_bytes == 0),
        ]
        .into_iter()
        .filter(|(_, zero)| *zero)
        .map(|(field, _)| {
            ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: field.to_string(),
                },
                format!("{} must be at least 1", field),
            )
        })
        .collect()
    }
}

/// Combine `[agent]` limits and `[execution]` settings.
pub fn execution_params(
    agent: &super::FileAgentConfig,
    execution: &FileExecutionConfig,
) -> ExecutionParams {
    ExecutionParams::default()
        .with_max_safety_replans(agent.max_safety_replans)
        .with_max_cycles(agent.max_cycles)
        .with_command_timeout(Duration::from_secs(execution.command_timeout_secs))
        .with_max_pending(execution.max_pending)
        .with_poll_interval(Duration::from_millis(execution.poll_interval_ms))
        .with_output_cap(execution.output_cap_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file_config::FileAgentConfig;

    #[test]
    fn test_defaults_round_into_params() {
        let params = execution_params(&FileAgentConfig::default(), &FileExecutionConfig::default());
        let expected = ExecutionParams::default();
        assert_eq!(params.command_timeout, expected.command_timeout);
        assert_eq!(params.poll_interval, expected.poll_interval);
        assert_eq!(params.max_cycles, expected.max_cycles);
    }

    #[test]
    fn test_zero_limits_are_errors() {
        let config = FileExecutionConfig {
            command_timeout_secs: 0,
            max_pending: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().len(), 2);
    }
}
