//! Fact Store entities.
//!
//! Each category is a [`FactSet`]: a collection keyed by a normalized
//! identity. Entries keep their insertion order for reporting, but equality
//! compares the sets by identity, so two stores built from the same
//! observations in a different order are equal.

use super::identity::join_specific;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// A deduplicated piece of discovered information.
///
/// `absorb` joins another fact with the same key into `self`. It must be
/// commutative, associative and idempotent; the merger relies on that to
/// make merge order irrelevant.
pub trait Fact: Clone + PartialEq {
    type Key: Ord + Clone + std::fmt::Debug;

    fn key(&self) -> Self::Key;

    fn absorb(&mut self, other: &Self);
}

/// Set of facts of one category keyed by identity.
#[derive(Debug, Clone)]
pub struct FactSet<F: Fact> {
    items: Vec<F>,
}

impl<F: Fact> Default for FactSet<F> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<F: Fact> FactSet<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or join a fact. Returns `true` if the set changed.
    pub fn insert(&mut self, fact: F) -> bool {
        let key = fact.key();
        match self.items.iter_mut().find(|f| f.key() == key) {
            Some(existing) => {
                let before = existing.clone();
                existing.absorb(&fact);
                *existing != before
            }
            None => {
                self.items.push(fact);
                true
            }
        }
    }

    pub fn get(&self, key: &F::Key) -> Option<&F> {
        self.items.iter().find(|f| &f.key() == key)
    }

    pub fn contains_key(&self, key: &F::Key) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, F> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&F) -> bool) {
        self.items.retain(keep);
    }

    /// Keys present more than once. Always empty for sets built via `insert`.
    pub fn duplicate_keys(&self) -> Vec<F::Key> {
        let mut seen = BTreeSet::new();
        self.items
            .iter()
            .map(Fact::key)
            .filter(|k| !seen.insert(k.clone()))
            .collect()
    }
}

impl<F: Fact> PartialEq for FactSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .items
                .iter()
                .all(|f| other.get(&f.key()).is_some_and(|o| o == f))
    }
}

impl<F: Fact> Eq for FactSet<F> {}

impl<F: Fact> FromIterator<F> for FactSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::new();
        for fact in iter {
            set.insert(fact);
        }
        set
    }
}

impl<'a, F: Fact> IntoIterator for &'a FactSet<F> {
    type Item = &'a F;
    type IntoIter = std::slice::Iter<'a, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<F: Fact + Serialize> Serialize for FactSet<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, F: Fact + Deserialize<'de>> Deserialize<'de> for FactSet<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<F>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

// ==================== Hosts ====================

/// A live host.
///
/// Keyed by its normalized address. A host seen only by name is keyed by
/// that single lowercase hostname until an address-bearing observation
/// claims the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub hostnames: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

impl Host {
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            key: address.clone(),
            address: Some(address),
            hostnames: BTreeSet::new(),
            os: None,
        }
    }

    pub fn from_hostname(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            key: hostname.clone(),
            address: None,
            hostnames: BTreeSet::from([hostname]),
            os: None,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.insert(hostname.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Name-only entry carrying nothing beyond its name.
    pub fn is_bare_alias(&self) -> bool {
        self.address.is_none() && self.os.is_none()
    }
}

impl Fact for Host {
    type Key = String;

    fn key(&self) -> String {
        self.key.clone()
    }

    fn absorb(&mut self, other: &Self) {
        if self.address.is_none() {
            self.address = other.address.clone();
        }
        self.hostnames.extend(other.hostnames.iter().cloned());
        join_specific(&mut self.os, &other.os);
    }
}

// ==================== Services ====================

/// An open port and what listens on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Service {
    pub fn new(host: impl Into<String>, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: protocol.into(),
            service: None,
            version: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl Fact for Service {
    type Key = (String, u16, String);

    fn key(&self) -> Self::Key {
        (self.host.clone(), self.port, self.protocol.clone())
    }

    fn absorb(&mut self, other: &Self) {
        join_specific(&mut self.service, &other.service);
        join_specific(&mut self.version, &other.version);
    }
}

// ==================== Vulnerabilities ====================

/// Severity of a finding. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Unknown,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" | "crit" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" | "med" => Severity::Medium,
            "low" => Severity::Low,
            "info" | "informational" | "none" => Severity::Info,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a finding applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AffectedTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl std::fmt::Display for AffectedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let host = self.host.as_deref().unwrap_or("unknown");
        match self.port {
            Some(port) => write!(f, "{}:{}", host, port),
            None => write!(f, "{}", host),
        }
    }
}

/// Identity of a vulnerability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VulnerabilityKey {
    Cve(String),
    Finding {
        kind: String,
        target: AffectedTarget,
    },
}

/// A discovered weakness.
///
/// Keyed by CVE when one is known; otherwise by its type and the single
/// target it was seen on. A CVE entry accumulates every target it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub affected: BTreeSet<AffectedTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub exploit_available: bool,
}

impl Vulnerability {
    pub fn new(kind: impl Into<String>, target: AffectedTarget) -> Self {
        Self {
            cve: None,
            kind: kind.into(),
            severity: Severity::Unknown,
            affected: BTreeSet::from([target]),
            description: None,
            exploit_available: false,
        }
    }

    pub fn with_cve(mut self, cve: impl Into<String>) -> Self {
        self.cve = Some(cve.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Fact for Vulnerability {
    type Key = VulnerabilityKey;

    fn key(&self) -> VulnerabilityKey {
        match &self.cve {
            Some(cve) => VulnerabilityKey::Cve(cve.clone()),
            None => VulnerabilityKey::Finding {
                kind: self.kind.clone(),
                target: self.affected.iter().next().cloned().unwrap_or(AffectedTarget {
                    host: None,
                    port: None,
                }),
            },
        }
    }

    fn absorb(&mut self, other: &Self) {
        if (other.kind.len(), other.kind.as_str()) > (self.kind.len(), self.kind.as_str()) {
            self.kind = other.kind.clone();
        }
        self.severity = self.severity.max(other.severity);
        self.affected.extend(other.affected.iter().cloned());
        join_specific(&mut self.description, &other.description);
        self.exploit_available |= other.exploit_available;
    }
}

// ==================== Credentials ====================

/// A recovered credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub secret: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl Fact for Credential {
    type Key = (String, String, String);

    fn key(&self) -> Self::Key {
        (
            self.username.clone(),
            self.secret.clone(),
            self.target.clone(),
        )
    }

    fn absorb(&mut self, other: &Self) {
        join_specific(&mut self.service, &other.service);
    }
}

// ==================== Technologies ====================

/// A detected technology (web framework, CMS, server software).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Fact for Technology {
    type Key = (String, Option<String>);

    fn key(&self) -> Self::Key {
        (self.name.clone(), self.host.clone())
    }

    fn absorb(&mut self, other: &Self) {
        join_specific(&mut self.version, &other.version);
    }
}

// ==================== Store ====================

/// All facts accumulated by a session. Mutated only through the merger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactStore {
    pub hosts: FactSet<Host>,
    pub services: FactSet<Service>,
    pub vulnerabilities: FactSet<Vulnerability>,
    pub credentials: FactSet<Credential>,
    pub technologies: FactSet<Technology>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.summary().total() == 0
    }

    pub fn summary(&self) -> FactSummary {
        FactSummary {
            hosts: self.hosts.len(),
            services: self.services.len(),
            vulnerabilities: self.vulnerabilities.len(),
            credentials: self.credentials.len(),
            technologies: self.technologies.len(),
        }
    }

    /// Addresses of live hosts, in discovery order.
    pub fn host_addresses(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter_map(|h| h.address.as_deref())
            .collect()
    }

    /// Services on a given host key.
    pub fn services_on<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Service> + 'a {
        self.services.iter().filter(move |s| s.host == host)
    }

    /// Identity collisions within any category; non-empty means corruption.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for key in self.hosts.duplicate_keys() {
            issues.push(format!("duplicate host {}", key));
        }
        for key in self.services.duplicate_keys() {
            issues.push(format!("duplicate service {:?}", key));
        }
        for key in self.vulnerabilities.duplicate_keys() {
            issues.push(format!("duplicate vulnerability {:?}", key));
        }
        for key in self.credentials.duplicate_keys() {
            issues.push(format!("duplicate credential for {}@{}", key.0, key.2));
        }
        for key in self.technologies.duplicate_keys() {
            issues.push(format!("duplicate technology {:?}", key));
        }
        issues
    }
}

/// Per-category counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSummary {
    pub hosts: usize,
    pub services: usize,
    pub vulnerabilities: usize,
    pub credentials: usize,
    pub technologies: usize,
}

impl FactSummary {
    pub fn total(&self) -> usize {
        self.hosts + self.services + self.vulnerabilities + self.credentials + self.technologies
    }

    /// Growth relative to an earlier summary.
    pub fn since(&self, earlier: &FactSummary) -> FactSummary {
        FactSummary {
            hosts: self.hosts.saturating_sub(earlier.hosts),
            services: self.services.saturating_sub(earlier.services),
            vulnerabilities: self.vulnerabilities.saturating_sub(earlier.vulnerabilities),
            credentials: self.credentials.saturating_sub(earlier.credentials),
            technologies: self.technologies.saturating_sub(earlier.technologies),
        }
    }
}

impl std::fmt::Display for FactSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hosts, {} services, {} vulnerabilities, {} credentials, {} technologies",
            self.hosts, self.services, self.vulnerabilities, self.credentials, self.technologies
        )
    }
}
