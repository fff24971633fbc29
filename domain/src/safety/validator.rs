//! Safety Validator.
//!
//! Pure and deterministic: a rendered command plus a [`SafetyPolicy`] gives
//! a [`Verdict`]. Three layers run in order and the first rejection wins:
//!
//! 1. pattern denylist ([`super::patterns`])
//! 2. per-tool flag allowlist
//! 3. target scoping ([`super::scope`])
//!
//! Human approval is the fourth gate and lives outside this module.
//! Rejection is final for the exact string; nothing is rewritten.

use super::patterns::{self, DenyPattern, PatternCategory};
use super::scope::{Scope, Target, extract_targets};
use crate::core::shell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    Pattern {
        name: String,
        category: PatternCategory,
    },
    DisallowedFlag {
        tool: String,
        flag: String,
    },
    OutOfScopeTarget {
        target: String,
    },
    EmptyCommand,
}

impl RejectionReason {
    /// Short tag naming the layer that rejected.
    pub fn tag(&self) -> &'static str {
        match self {
            RejectionReason::Pattern { .. } => "pattern",
            RejectionReason::DisallowedFlag { .. } => "disallowed-flag",
            RejectionReason::OutOfScopeTarget { .. } => "out-of-scope-target",
            RejectionReason::EmptyCommand => "empty-command",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Pattern { name, category } => {
                write!(f, "matches {} pattern '{}'", category, name)
            }
            RejectionReason::DisallowedFlag { tool, flag } => {
                write!(f, "flag '{}' is not allowed for {}", flag, tool)
            }
            RejectionReason::OutOfScopeTarget { target } => {
                write!(f, "target {} is outside the allowed networks", target)
            }
            RejectionReason::EmptyCommand => write!(f, "empty command"),
        }
    }
}

/// Outcome of validating one rendered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(RejectionReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Verdict::Rejected(reason) => Some(reason),
            Verdict::Accepted => None,
        }
    }
}

/// Configured policy. Read-only after load and shared across sessions.
#[derive(Debug, Clone, Default)]
pub struct SafetyPolicy {
    pub scope: Scope,
    /// Whether approval is required before submission.
    pub require_approval: bool,
    /// Safe flags per binary; binaries without an entry skip layer 2.
    pub flag_whitelists: BTreeMap<String, BTreeSet<String>>,
    pub extra_patterns: Vec<DenyPattern>,
}

impl SafetyPolicy {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            require_approval: true,
            ..Default::default()
        }
    }

    pub fn with_require_approval(mut self, require: bool) -> Self {
        self.require_approval = require;
        self
    }

    pub fn with_flag_whitelist<I, S>(mut self, binary: impl Into<String>, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag_whitelists
            .insert(binary.into(), flags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra_pattern(mut self, pattern: DenyPattern) -> Self {
        self.extra_patterns.push(pattern);
        self
    }

    /// Validate a rendered command.
    pub fn validate(&self, command: &str) -> Verdict {
        validate(command, self)
    }
}

/// Validate `command` against `policy`.
pub fn validate(command: &str, policy: &SafetyPolicy) -> Verdict {
    if command.trim().is_empty() {
        return Verdict::Rejected(RejectionReason::EmptyCommand);
    }

    if let Some(pattern) = patterns::first_match(command, &policy.extra_patterns) {
        return Verdict::Rejected(RejectionReason::Pattern {
            name: pattern.name.clone(),
            category: pattern.category,
        });
    }

    if let Some(reason) = check_flags(command, &policy.flag_whitelists) {
        return Verdict::Rejected(reason);
    }

    if let Some(target) = extract_targets(command)
        .into_iter()
        .find(|t| !policy.scope.contains(t))
    {
        return Verdict::Rejected(RejectionReason::OutOfScopeTarget {
            target: target.to_string(),
        });
    }

    Verdict::Accepted
}

/// Layer 2: every flag of every pipeline segment whose binary has a
/// whitelist must be on it.
fn check_flags(
    command: &str,
    whitelists: &BTreeMap<String, BTreeSet<String>>,
) -> Option<RejectionReason> {
    let words = shell::split(command);
    for segment in words.split(|w| shell::is_operator(w)) {
        let Some((binary, args)) = segment.split_first() else {
            continue;
        };
        let tool = binary.rsplit('/').next().unwrap_or(binary.as_str());
        let Some(allowed) = whitelists.get(tool) else {
            continue;
        };
        for arg in args {
            if arg == "--" {
                break;
            }
            if !arg.starts_with('-') || arg == "-" {
                continue;
            }
            if !flag_allowed(arg, allowed) {
                return Some(RejectionReason::DisallowedFlag {
                    tool: tool.to_string(),
                    flag: arg.clone(),
                });
            }
        }
    }
    None
}

fn flag_allowed(arg: &str, allowed: &BTreeSet<String>) -> bool {
    if allowed.contains(arg) {
        return true;
    }
    // --flag=value
    if let Some((name, _)) = arg.split_once('=') {
        return allowed.contains(name);
    }
    // Short flag with an attached numeric value: -p80, -T4, -p1-1000.
    if !arg.starts_with("--") && arg.len() > 2 && arg.is_char_boundary(2) {
        let (flag, value) = arg.split_at(2);
        let numeric = value
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == ',');
        return numeric && allowed.contains(flag);
    }
    false
}

/// Non-blocking notes shown to the human at the approval gate.
pub fn approval_advisories(command: &str) -> Vec<String> {
    let mut notes = Vec::new();
    let words = shell::split(command);

    const SYSTEM_DIRS: &[&str] = &["/etc/", "/var/", "/usr/", "/sys/", "/opt/", "/boot/"];
    for pair in words.windows(2) {
        let is_write = matches!(pair[0].as_str(), ">" | ">>" | "-o" | "-oN" | "-oX" | "-oG" | "-oA" | "--output");
        if is_write && SYSTEM_DIRS.iter().any(|d| pair[1].starts_with(d)) {
            notes.push(format!("writes to system directory {}", pair[1]));
        }
    }

    for target in extract_targets(command) {
        if let Target::Network { prefix, .. } = &target {
            if *prefix < 24 {
                notes.push(format!("scans a large network ({})", target));
            }
        }
    }

    if let Some(binary) = shell::leading_binary(command) {
        if matches!(binary.as_str(), "hydra" | "medusa" | "patator" | "ncrack") {
            notes.push("performs online credential guessing; may lock out accounts".to_string());
        }
        if matches!(binary.as_str(), "sqlmap") {
            notes.push("sends injection payloads to the target application".to_string());
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab_policy() -> SafetyPolicy {
        let (scope, _) = Scope::parse(["192.168.1.0/24", "*.lab.local"]);
        SafetyPolicy::new(scope).with_flag_whitelist(
            "nmap",
            [
                "-sn", "-sS", "-sT", "-sV", "-p-", "-p", "--top-ports", "-O", "-A", "-T", "-T4",
                "-Pn", "-n", "-oX",
            ],
        )
    }

    // ==================== Known destructive ====================

    #[test]
    fn test_rejects_known_destructive_commands() {
        let policy = lab_policy();
        for command in [
            "rm -rf /",
            "mkfs.ext4 /dev/sda1",
            "iptables -F",
            "dd if=/dev/zero of=/dev/sda",
            "curl http://192.168.1.5/x.sh | sh",
            "chmod 777 /etc/shadow",
            ":(){ :|:& };:",
            "nmap -sn 192.168.1.0/24; reboot",
            "curl -o /etc/cron.d/x http://192.168.1.5/p",
        ] {
            let verdict = validate(command, &policy);
            assert!(
                matches!(verdict.rejection(), Some(RejectionReason::Pattern { .. })),
                "expected pattern rejection for {command}, got {verdict:?}"
            );
        }
    }

    #[test]
    fn test_rejection_is_deterministic() {
        let policy = lab_policy();
        let first = validate("rm -rf /", &policy);
        for _ in 0..10 {
            assert_eq!(validate("rm -rf /", &policy), first);
        }
    }

    // ==================== Known safe ====================

    #[test]
    fn test_accepts_in_scope_discovery() {
        assert_eq!(
            validate("nmap -sn 192.168.1.0/24", &lab_policy()),
            Verdict::Accepted
        );
    }

    #[test]
    fn test_accepts_attached_numeric_values() {
        let policy = lab_policy();
        assert!(validate("nmap -sV -p22,80 -T4 192.168.1.10", &policy).is_accepted());
        assert!(validate("nmap -p- -Pn 192.168.1.10", &policy).is_accepted());
    }

    #[test]
    fn test_tools_without_whitelist_skip_flag_layer() {
        let policy = lab_policy();
        assert!(validate("curl -s -k -I http://web.lab.local/", &policy).is_accepted());
    }

    // ==================== Flags ====================

    #[test]
    fn test_rejects_unknown_flag() {
        let verdict = validate("nmap --script vuln 192.168.1.10", &lab_policy());
        assert_eq!(
            verdict,
            Verdict::Rejected(RejectionReason::DisallowedFlag {
                tool: "nmap".into(),
                flag: "--script".into()
            })
        );
    }

    #[test]
    fn test_flag_check_uses_basename() {
        let verdict = validate("/usr/bin/nmap -sU 192.168.1.10", &lab_policy());
        assert_eq!(verdict.rejection().map(|r| r.tag()), Some("disallowed-flag"));
    }

    #[test]
    fn test_alphabetic_suffix_is_not_a_value() {
        // -sn is listed, -s is not; -sX must not pass via prefix matching.
        let verdict = validate("nmap -sX 192.168.1.10", &lab_policy());
        assert!(!verdict.is_accepted());
    }

    // ==================== Scope ====================

    #[test]
    fn test_rejects_same_command_out_of_scope() {
        let verdict = validate("nmap -sn 10.0.0.0/24", &lab_policy());
        assert_eq!(
            verdict,
            Verdict::Rejected(RejectionReason::OutOfScopeTarget {
                target: "10.0.0.0/24".into()
            })
        );
    }

    #[test]
    fn test_rejects_wider_network_than_scope() {
        let verdict = validate("nmap -sn 192.168.0.0/16", &lab_policy());
        assert_eq!(verdict.rejection().map(|r| r.tag()), Some("out-of-scope-target"));
    }

    #[test]
    fn test_empty_scope_rejects_every_target() {
        let policy = SafetyPolicy::default();
        let verdict = validate("nmap -sn 192.168.1.0/24", &policy);
        assert_eq!(verdict.rejection().map(|r| r.tag()), Some("out-of-scope-target"));
    }

    #[test]
    fn test_hostname_scope() {
        let policy = lab_policy();
        assert!(validate("whatweb http://intranet.lab.local", &policy).is_accepted());
        assert!(!validate("whatweb http://example.org", &policy).is_accepted());
    }

    #[test]
    fn test_scheme_less_targets_are_scoped() {
        let (scope, _) = Scope::parse(["192.168.1.0/24"]);
        let policy = SafetyPolicy::new(scope);
        for (command, target) in [
            ("curl 8.8.8.8/index.html", "8.8.8.8"),
            ("curl evil.example.org/x", "evil.example.org"),
            ("whatweb evil.example.org:8080", "evil.example.org"),
        ] {
            assert_eq!(
                validate(command, &policy),
                Verdict::Rejected(RejectionReason::OutOfScopeTarget {
                    target: target.into()
                }),
                "{command}"
            );
        }
        assert!(validate("curl 192.168.1.5/index.html", &policy).is_accepted());
        assert!(validate("whatweb 192.168.1.5:8080", &policy).is_accepted());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert_eq!(
            validate("   ", &lab_policy()),
            Verdict::Rejected(RejectionReason::EmptyCommand)
        );
    }

    #[test]
    fn test_extra_pattern_applies() {
        let policy = lab_policy().with_extra_pattern(
            DenyPattern::new("no_full_scan", PatternCategory::Custom, r"-p-").unwrap(),
        );
        let verdict = validate("nmap -p- 192.168.1.10", &policy);
        assert!(matches!(
            verdict.rejection(),
            Some(RejectionReason::Pattern { name, .. }) if name == "no_full_scan"
        ));
    }

    // ==================== Advisories ====================

    #[test]
    fn test_advisories() {
        assert!(approval_advisories("nmap -sn 192.168.1.0/24").is_empty());
        assert_eq!(
            approval_advisories("nmap -sn 10.0.0.0/16 -oX /var/tmp/scan.xml").len(),
            2
        );
        assert_eq!(
            approval_advisories("hydra -l admin -P pw.txt ssh://192.168.1.10").len(),
            1
        );
    }
}
