//! Destructive command signatures.
//!
//! A fixed catalog of case-insensitive regexes grouped by category. One
//! match is enough to reject; there is no scoring.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Family a denylist pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    FilesystemDestruction,
    DiskOverwrite,
    PrivilegeEscalation,
    FirewallManipulation,
    Exfiltration,
    RemoteCodeExecution,
    PowerControl,
    PermissionWeakening,
    /// Operator-supplied pattern from configuration.
    Custom,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::FilesystemDestruction => "filesystem_destruction",
            PatternCategory::DiskOverwrite => "disk_overwrite",
            PatternCategory::PrivilegeEscalation => "privilege_escalation",
            PatternCategory::FirewallManipulation => "firewall_manipulation",
            PatternCategory::Exfiltration => "exfiltration",
            PatternCategory::RemoteCodeExecution => "remote_code_execution",
            PatternCategory::PowerControl => "power_control",
            PatternCategory::PermissionWeakening => "permission_weakening",
            PatternCategory::Custom => "custom",
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, compiled denylist entry.
#[derive(Debug, Clone)]
pub struct DenyPattern {
    pub name: String,
    pub category: PatternCategory,
    regex: Regex,
}

impl DenyPattern {
    pub fn new(
        name: impl Into<String>,
        category: PatternCategory,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            name: name.into(),
            category,
            regex,
        })
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

use PatternCategory::*;

const BUILTIN: &[(&str, PatternCategory, &str)] = &[
    // Filesystem destruction
    ("rm_recursive", FilesystemDestruction, r"\brm\s+(?:[^|;&]*\s)?-{1,2}[a-z]*r"),
    ("rm_wildcard", FilesystemDestruction, r"\brm\s+[^|;&]*\*"),
    ("rm_root", FilesystemDestruction, r"\brm\s+(?:-\S+\s+)*/(?:\s|$)"),
    ("find_delete", FilesystemDestruction, r"\bfind\b[^|;&]*\s-delete\b"),
    ("shred", FilesystemDestruction, r"\bshred\b"),
    ("move_to_null", FilesystemDestruction, r"\bmv\s+[^|;&]*\s/dev/null\b"),
    ("truncate_system_file", FilesystemDestruction, r"(?:^|[^>])>\s*/(?:etc|boot|bin|sbin|lib|usr)/"),
    ("output_to_system_dir", FilesystemDestruction, r#"(?:^|\s)(?:-o[nxgas]?|--output(?:-document|-file|-dir)?)(?:\s+|=)['"]?/(?:etc|boot|bin|sbin|lib|lib64|usr|root|var/spool/cron)(?:/|\s|$)"#),
    // Disk overwrite
    ("mkfs", DiskOverwrite, r"\bmkfs(?:\.\w+)?\b"),
    ("dd_to_device", DiskOverwrite, r"\bdd\b[^|;&]*\bof=/dev/"),
    ("redirect_to_device", DiskOverwrite, r">\s*/dev/(?:sd|hd|nvme|vd|xvd|mmcblk|disk)"),
    ("partition_tools", DiskOverwrite, r"\b(?:wipefs|fdisk|sfdisk|parted|diskpart)\b"),
    ("format_volume", DiskOverwrite, r"\bformat\s+[a-z]:"),
    ("fork_bomb", DiskOverwrite, r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
    // Privilege escalation
    ("sudo", PrivilegeEscalation, r"\bsudo\b"),
    ("su", PrivilegeEscalation, r"(?:^|[;&|(`]\s*|\$\(\s*)su\b"),
    ("doas_pkexec", PrivilegeEscalation, r"\b(?:doas|pkexec)\b"),
    ("runas", PrivilegeEscalation, r"\brunas\b"),
    ("setuid_bit", PrivilegeEscalation, r"\bchmod\s+(?:-\S+\s+)*(?:[ugoa]*\+s\b|0?[2467][0-7]{3}\b)"),
    ("chown_root", PrivilegeEscalation, r"\bchown\s+(?:-\S+\s+)*root\b"),
    ("sudoers", PrivilegeEscalation, r"/etc/sudoers"),
    ("account_files_write", PrivilegeEscalation, r">>?\s*/etc/(?:passwd|shadow|group)\b"),
    ("user_management", PrivilegeEscalation, r"(?:^|[;&|]\s*)(?:useradd|usermod|adduser|passwd)\b"),
    // Firewall and routing
    ("firewall_tools", FirewallManipulation, r"\b(?:ip6?tables(?:-restore)?|nft|ufw|firewall-cmd|pfctl)\b"),
    ("route_change", FirewallManipulation, r"\b(?:ip\s+route\s+(?:add|del|delete|change|replace|flush)|route\s+(?:add|del|delete|flush))\b"),
    ("ip_forwarding", FirewallManipulation, r"\bip_forward\b|\.forwarding\s*="),
    ("interface_down", FirewallManipulation, r"\b(?:ifconfig\s+\S+\s+down|ip\s+link\s+set\s+\S+\s+down|ifdown)\b"),
    // Exfiltration
    ("scp_remote", Exfiltration, r"\bscp\b[^|;&]*@"),
    ("rsync_remote", Exfiltration, r"\brsync\b[^|;&]*(?:@|::)"),
    ("curl_upload", Exfiltration, r"\bcurl\b[^|;&]*(?:--upload-file|\s-T\s|(?:\s-d|\s-F|--data\S*|--form)\s*(?:\S*=)?@)"),
    ("wget_post_file", Exfiltration, r"\bwget\b[^|;&]*--post-file"),
    ("netcat_file_transfer", Exfiltration, r"\b(?:nc|ncat|netcat)\b[^|;&]*[<>]"),
    ("dev_tcp", Exfiltration, r"/dev/(?:tcp|udp)/"),
    // Remote code
    ("pipe_to_shell", RemoteCodeExecution, r"\|\s*(?:sudo\s+)?(?:ba|z|k|da|fi)?sh\b"),
    ("pipe_to_interpreter", RemoteCodeExecution, r"\|\s*(?:python[0-9.]*|perl|ruby|php|node|lua)\b"),
    ("netcat_exec", RemoteCodeExecution, r"\b(?:nc|ncat|netcat)\b[^|;&]*\s-[ec]\b"),
    ("download_substitution", RemoteCodeExecution, r"(?:\$\(|`)\s*(?:curl|wget)\b"),
    ("eval", RemoteCodeExecution, r"(?:^|[;&|(]\s*)eval\b"),
    // Power control
    ("power_commands", PowerControl, r"\b(?:shutdown|reboot|poweroff|halt)\b"),
    ("init_runlevel", PowerControl, r"\binit\s+[06]\b"),
    ("systemctl_power", PowerControl, r"\bsystemctl\s+(?:poweroff|reboot|halt|kexec)\b"),
    ("kill_everything", PowerControl, r"\bkill\s+-9\s+-1\b|\bkillall5?\b"),
    // Permission weakening
    ("world_writable", PermissionWeakening, r"\bchmod\s+(?:-\S+\s+)*(?:0?777|[ugoa]*o[ugoa]*\+w|a\+w)\b"),
    ("selinux_off", PermissionWeakening, r"\bsetenforce\s+0\b"),
];

/// Compiled built-in catalog.
pub static BUILTIN_PATTERNS: LazyLock<Vec<DenyPattern>> = LazyLock::new(|| {
    BUILTIN
        .iter()
        .map(|(name, category, pattern)| {
            DenyPattern::new(*name, *category, pattern).expect("valid builtin deny pattern")
        })
        .collect()
});

/// First built-in pattern matching `command`.
pub fn first_builtin_match(command: &str) -> Option<&'static DenyPattern> {
    BUILTIN_PATTERNS.iter().find(|p| p.is_match(command))
}

/// First built-in, then operator-supplied, pattern matching `command`.
pub fn first_match<'a>(command: &str, extra: &'a [DenyPattern]) -> Option<&'a DenyPattern> {
    first_builtin_match(command).or_else(|| extra.iter().find(|p| p.is_match(command)))
}
