//! Safety configuration from TOML (`[safety]` section)

use gauntlet_domain::config::{ConfigIssue, ConfigIssueCode};
use gauntlet_domain::safety::{DenyPattern, PatternCategory, SafetyPolicy, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Raw safety configuration from TOML
///
/// # Example
///
/// ```toml
/// [safety]
/// allowed_networks = ["192.168.1.0/24", "lab.internal"]
/// require_approval = true
/// deny_patterns = ["\\bnc\\s+-e\\b"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSafetyConfig {
    /// CIDR blocks, addresses, hostnames or `*.domain` entries
    pub allowed_networks: Vec<String>,
    pub require_approval: bool,
    /// Extra deny regexes, matched case-insensitively
    pub deny_patterns: Vec<String>,
}

impl Default for FileSafetyConfig {
    fn default() -> Self {
        Self {
            allowed_networks: Vec::new(),
            require_approval: true,
            deny_patterns: Vec::new(),
        }
    }
}

impl FileSafetyConfig {
    /// Parse the configured networks plus `extra` entries (e.g. `--scope`).
    pub fn parse_scope(&self, extra: &[String]) -> (Scope, Vec<ConfigIssue>) {
        let (scope, invalid) = Scope::parse(self.allowed_networks.iter().chain(extra));
        let mut issues: Vec<ConfigIssue> = invalid
            .into_iter()
            .map(|value| {
                ConfigIssue::error(
                    ConfigIssueCode::InvalidScopeEntry {
                        value: value.clone(),
                    },
                    format!(
                        "safety.allowed_networks: '{}' is not a network, address or hostname",
                        value
                    ),
                )
            })
            .collect();
        if scope.is_empty() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::EmptyScope,
                "safety.allowed_networks is empty; every target will be rejected",
            ));
        }
        (scope, issues)
    }

    pub fn parse_deny_patterns(&self) -> (Vec<DenyPattern>, Vec<ConfigIssue>) {
        let mut patterns = Vec::new();
        let mut issues = Vec::new();
        for (i, raw) in self.deny_patterns.iter().enumerate() {
            match DenyPattern::new(format!("custom-{}", i + 1), PatternCategory::Custom, raw) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidDenyPattern {
                        pattern: raw.clone(),
                    },
                    format!("safety.deny_patterns: '{}' does not compile: {}", raw, e),
                )),
            }
        }
        (patterns, issues)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.parse_scope(&[]).1;
        // An empty configured scope is normal when `--scope` supplies it.
        issues.retain(|i| i.code != ConfigIssueCode::EmptyScope);
        issues.extend(self.parse_deny_patterns().1);
        if !self.require_approval {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ApprovalDisabled,
                "safety.require_approval is false; accepted commands are submitted without review",
            ));
        }
        issues
    }

    /// Build the policy; flag allowlists come from the tool catalog.
    pub fn to_safety_policy(
        &self,
        extra_scope: &[String],
        flag_whitelists: &BTreeMap<String, BTreeSet<String>>,
    ) -> (SafetyPolicy, Vec<ConfigIssue>) {
        let (scope, mut issues) = self.parse_scope(extra_scope);
        let (patterns, pattern_issues) = self.parse_deny_patterns();
        issues.extend(pattern_issues);

        let mut policy = SafetyPolicy::new(scope).with_require_approval(self.require_approval);
        for (binary, flags) in flag_whitelists {
            policy = policy.with_flag_whitelist(binary.clone(), flags.iter().cloned());
        }
        for pattern in patterns {
            policy = policy.with_extra_pattern(pattern);
        }
        (policy, issues)
    }
}
