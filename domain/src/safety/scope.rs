//! Target extraction and scope membership.
//!
//! Targets are pulled out of a rendered command (bare addresses, CIDR
//! blocks, last-octet ranges, URL hosts with or without a scheme,
//! `user@host` forms, SMB paths and standalone hostnames) and checked
//! against the allowed-networks set.

use crate::core::shell;
use crate::facts::identity::{normalize_hostname, normalize_ip};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::LazyLock;

static IPV4_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}\.\d{1,3}\.\d{1,3}\.)(\d{1,3})(?:-(\d{1,3}))?(?:/(\d{1,2}))?(?::\d+)?$")
        .expect("valid target regex")
});

static URL_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*:)?//(?:[^@/]*@)?(\[[0-9a-f:]+\]|[^:/?#]+)")
        .expect("valid url regex")
});

/// File suffixes that look like TLDs but name files.
const FILE_SUFFIXES: &[&str] = &[
    "txt", "lst", "list", "xml", "json", "csv", "html", "htm", "php", "asp", "aspx", "jsp", "log",
    "nmap", "gnmap", "out", "conf", "cfg", "ini", "yaml", "yml", "toml", "pcap", "db", "sql", "gz",
    "zip", "tar", "sh", "py", "rb", "pl", "js", "md", "bak", "old", "key", "pem", "crt", "nse",
    "lua", "rc", "exe", "dll", "bin", "c", "jpg", "png", "pdf",
];

/// A target found in a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Address { ip: Ipv4Addr },
    Network { base: Ipv4Addr, prefix: u8 },
    Range { first: Ipv4Addr, last: Ipv4Addr },
    Hostname { name: String },
    /// IPv6 literals are never in scope.
    Ipv6 { ip: String },
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Address { ip } => write!(f, "{}", ip),
            Target::Network { base, prefix } => write!(f, "{}/{}", base, prefix),
            Target::Range { first, last } => write!(f, "{}-{}", first, last),
            Target::Hostname { name } => write!(f, "{}", name),
            Target::Ipv6 { ip } => write!(f, "{}", ip),
        }
    }
}

/// One entry of the allowed-networks set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeEntry {
    Network { base: u32, prefix: u8 },
    Host(String),
    /// `*.example.com` or `.example.com`: the domain and all subdomains.
    Domain(String),
}

impl ScopeEntry {
    /// Parse `10.0.0.0/8`, `10.0.0.5`, `example.com` or `*.example.com`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some((addr, prefix)) = raw.split_once('/') {
            let addr: Ipv4Addr = normalize_ip(addr)?.parse().ok()?;
            let prefix: u8 = prefix.parse().ok().filter(|p| *p <= 32)?;
            return Some(ScopeEntry::Network {
                base: u32::from(addr) & mask(prefix),
                prefix,
            });
        }
        if let Some(ip) = normalize_ip(raw).and_then(|ip| ip.parse::<Ipv4Addr>().ok()) {
            return Some(ScopeEntry::Network {
                base: u32::from(ip),
                prefix: 32,
            });
        }
        if let Some(domain) = raw.strip_prefix("*.").or_else(|| raw.strip_prefix('.')) {
            return normalize_hostname(domain).map(ScopeEntry::Domain);
        }
        normalize_hostname(raw).map(ScopeEntry::Host)
    }

    fn contains_range(&self, first: u32, last: u32) -> bool {
        match self {
            ScopeEntry::Network { base, prefix } => {
                let m = mask(*prefix);
                first & m == *base && last & m == *base
            }
            _ => false,
        }
    }

    fn contains_name(&self, name: &str) -> bool {
        match self {
            ScopeEntry::Host(host) => host == name,
            ScopeEntry::Domain(domain) => {
                name == domain || name.ends_with(&format!(".{}", domain))
            }
            ScopeEntry::Network { .. } => false,
        }
    }
}

impl std::fmt::Display for ScopeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeEntry::Network { base, prefix } => {
                write!(f, "{}/{}", Ipv4Addr::from(*base), prefix)
            }
            ScopeEntry::Host(host) => write!(f, "{}", host),
            ScopeEntry::Domain(domain) => write!(f, "*.{}", domain),
        }
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

/// Allowed-networks set.
///
/// An empty scope contains nothing: every extracted target is out of scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    entries: Vec<ScopeEntry>,
}

impl Scope {
    pub fn new(entries: Vec<ScopeEntry>) -> Self {
        Self { entries }
    }

    /// Parse every entry; returns the entries that failed to parse.
    pub fn parse<I, S>(raw: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        let mut invalid = Vec::new();
        for item in raw {
            match ScopeEntry::parse(item.as_ref()) {
                Some(entry) => entries.push(entry),
                None => invalid.push(item.as_ref().to_string()),
            }
        }
        (Self { entries }, invalid)
    }

    pub fn entries(&self) -> &[ScopeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Address { ip } => {
                let ip = u32::from(*ip);
                self.entries.iter().any(|e| e.contains_range(ip, ip))
            }
            Target::Network { base, prefix } => {
                let first = u32::from(*base);
                let last = first | !mask(*prefix);
                self.entries.iter().any(|e| e.contains_range(first, last))
            }
            Target::Range { first, last } => {
                let (first, last) = (u32::from(*first), u32::from(*last));
                self.entries.iter().any(|e| e.contains_range(first, last))
            }
            Target::Hostname { name } => self.entries.iter().any(|e| e.contains_name(name)),
            Target::Ipv6 { .. } => false,
        }
    }
}

/// Every target referenced by `command`, excluding its leading binary.
pub fn extract_targets(command: &str) -> Vec<Target> {
    let mut targets = Vec::new();
    for word in shell::split(command).iter().skip(1) {
        if shell::is_operator(word) {
            continue;
        }
        // `--flag=value` and `key=value` carry their target after the `=`.
        let value = match word.split_once('=') {
            Some((_, v)) if !word.contains("://") || v.contains("://") => v,
            _ => word.as_str(),
        };
        if value.starts_with('-') {
            continue;
        }
        for part in value.split(',') {
            if let Some(target) = classify(part) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }
    targets
}

fn classify(token: &str) -> Option<Target> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(caps) = URL_HOST.captures(token) {
        let host = caps.get(1)?.as_str().trim_start_matches('[').trim_end_matches(']');
        return classify_host(host);
    }

    if let Some((_, host)) = token.rsplit_once('@') {
        let host = host.split(':').next().unwrap_or(host);
        return classify_host(host);
    }

    if let Some(target) = classify_ipv4(token) {
        return Some(target);
    }

    if let Some(target) = classify_ipv6(token) {
        return Some(target);
    }

    if token.starts_with(['/', '.', '~']) {
        return None;
    }
    match host_part(token) {
        Some(host) if host != token => classify_host(host),
        Some(_) => classify_hostname(token),
        None => None,
    }
}

/// Host of a scheme-less `host[:port][/path]` token.
///
/// `None` when the part after a colon is not a port, as in `user:pass`.
fn host_part(token: &str) -> Option<&str> {
    let authority = token.split('/').next().unwrap_or(token);
    match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            Some(host)
        }
        Some(_) => None,
        None => Some(authority),
    }
}

fn classify_host(host: &str) -> Option<Target> {
    classify_ipv4(host)
        .or_else(|| classify_ipv6(host))
        .or_else(|| classify_hostname(host))
}

fn classify_ipv6(token: &str) -> Option<Target> {
    let ip = normalize_ip(token).filter(|ip| ip.contains(':'))?;
    Some(Target::Ipv6 { ip })
}

fn classify_ipv4(token: &str) -> Option<Target> {
    let caps = IPV4_TARGET.captures(token)?;
    let prefix_octets = caps.get(1)?.as_str();
    let first_octet = caps.get(2)?.as_str();
    let first: Ipv4Addr = normalize_ip(&format!("{}{}", prefix_octets, first_octet))?
        .parse()
        .ok()?;

    if let Some(last) = caps.get(3) {
        let last: Ipv4Addr = normalize_ip(&format!("{}{}", prefix_octets, last.as_str()))?
            .parse()
            .ok()?;
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        return Some(Target::Range { first, last });
    }

    if let Some(prefix) = caps.get(4) {
        let prefix: u8 = prefix.as_str().parse().ok().filter(|p| *p <= 32)?;
        let base = Ipv4Addr::from(u32::from(first) & mask(prefix));
        return Some(Target::Network { base, prefix });
    }

    Some(Target::Address { ip: first })
}

fn classify_hostname(token: &str) -> Option<Target> {
    let name = normalize_hostname(token)?;
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    let tld = labels.last()?;
    if !tld.chars().all(|c| c.is_ascii_alphabetic()) || FILE_SUFFIXES.contains(tld) {
        return None;
    }
    Some(Target::Hostname { name })
}
