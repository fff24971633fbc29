//! Oracle configuration from TOML (`[oracle]` section)

use gauntlet_application::RetryPolicy;
use gauntlet_domain::config::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which oracle adapter answers the loop's decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OracleBackend {
    /// Rule-based, offline
    #[default]
    Heuristic,
    /// External program over stdin/stdout
    Process,
}

/// Raw oracle configuration from TOML
///
/// # Example
///
/// ```toml
/// [oracle]
/// backend = "process"                 # "heuristic" or "process"
/// command = "python3 oracle.py"       # required for "process"
/// timeout_secs = 120
/// max_attempts = 3
/// base_delay_ms = 1000
/// max_delay_secs = 30
/// concurrency = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOracleConfig {
    pub backend: String,
    pub command: Option<String>,
    /// Limit for one attempt
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    /// Oracle calls in flight across all sessions
    pub concurrency: usize,
}

impl Default for FileOracleConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            backend: "heuristic".to_string(),
            command: None,
            timeout_secs: policy.call_timeout.as_secs(),
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_secs: policy.max_delay.as_secs(),
            concurrency: policy.concurrency,
        }
    }
}

impl FileOracleConfig {
    pub fn parse_backend(&self) -> (OracleBackend, Vec<ConfigIssue>) {
        match self.backend.trim().to_lowercase().as_str() {
            "heuristic" | "offline" => (OracleBackend::Heuristic, vec![]),
            "process" | "command" => (OracleBackend::Process, vec![]),
            _ => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "oracle.backend".to_string(),
                        value: self.backend.clone(),
                        valid_values: vec!["heuristic".to_string(), "process".to_string()],
                    },
                    format!(
                        "oracle.backend: unknown value '{}', falling back to 'heuristic'",
                        self.backend
                    ),
                );
                (OracleBackend::default(), vec![issue])
            }
        }
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_call_timeout(Duration::from_secs(self.timeout_secs));
        policy.max_delay = Duration::from_secs(self.max_delay_secs);
        policy.concurrency = self.concurrency.max(1);
        policy
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let (backend, mut issues) = self.parse_backend();
        let has_command = self
            .command
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if backend == OracleBackend::Process && !has_command {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "oracle.command".to_string(),
                },
                "oracle.backend is 'process' but oracle.command is not set",
            ));
        }
        for (field, zero) in [
            ("oracle.timeout_secs", self.timeout_secs == 0),
            ("oracle.concurrency", self.concurrency == 0),
        ] {
            if zero {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::OutOfRange {
                        field: field.to_string(),
                    },
                    format!("{} must be at least 1", field),
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_retry_policy() {
        let config = FileOracleConfig::default();
        assert_eq!(config.parse_backend().0, OracleBackend::Heuristic);
        assert_eq!(config.to_retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_process_backend_needs_command() {
        let config = FileOracleConfig {
            backend: "process".to_string(),
            ..Default::default()
        };
        assert!(ConfigIssue::has_errors(&config.validate()));

        let config = FileOracleConfig {
            command: Some("python3 oracle.py".to_string()),
            ..config
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let config = FileOracleConfig {
            max_attempts: 5,
            base_delay_ms: 250,
            timeout_secs: 10,
            ..Default::default()
        };
        let policy = config.to_retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.call_timeout, Duration::from_secs(10));
    }
}
