//! Fact Merger.
//!
//! Turns the loosely shaped facts the oracle extracts from command output
//! into normalized entities and folds them into a [`FactStore`].
//!
//! `merge` is a pure join: for any batches `a` and `b`,
//! `merge(merge(s, a), b) == merge(merge(s, b), a)` and
//! `merge(merge(s, a), a) == merge(s, a)`.

use super::entities::{
    AffectedTarget, Credential, FactStore, FactSummary, Host, Service, Severity, Technology,
    Vulnerability,
};
use super::identity::{host_key, known_value, normalize_cve, normalize_hostname, normalize_ip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One batch of facts as produced by OBSERVE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservedFacts {
    pub hosts: Vec<HostObservation>,
    #[serde(alias = "ports")]
    pub services: Vec<ServiceObservation>,
    pub vulnerabilities: Vec<VulnerabilityObservation>,
    pub credentials: Vec<CredentialObservation>,
    pub technologies: Vec<TechnologyObservation>,
}

impl ObservedFacts {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
            && self.services.is_empty()
            && self.vulnerabilities.is_empty()
            && self.credentials.is_empty()
            && self.technologies.is_empty()
    }

    /// Batch of bare host addresses.
    pub fn hosts<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: addresses
                .into_iter()
                .map(|a| HostObservation {
                    address: Some(a.into()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

/// A host as reported; either a bare string or an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawHost")]
pub struct HostObservation {
    pub address: Option<String>,
    pub hostnames: Vec<String>,
    pub os: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHost {
    Bare(String),
    Detailed {
        #[serde(default, alias = "ip")]
        address: Option<String>,
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        hostnames: Vec<String>,
        #[serde(default)]
        os: Option<String>,
    },
}

impl From<RawHost> for HostObservation {
    fn from(raw: RawHost) -> Self {
        match raw {
            RawHost::Bare(address) => Self {
                address: Some(address),
                ..Default::default()
            },
            RawHost::Detailed {
                address,
                hostname,
                mut hostnames,
                os,
            } => {
                hostnames.extend(hostname);
                Self {
                    address,
                    hostnames,
                    os,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceObservation {
    #[serde(alias = "ip", alias = "target")]
    pub host: String,
    pub port: u16,
    pub protocol: Option<String>,
    #[serde(alias = "name")]
    pub service: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnerabilityObservation {
    #[serde(alias = "cve_id")]
    pub cve: Option<String>,
    #[serde(alias = "name", alias = "type")]
    pub kind: Option<String>,
    pub severity: Option<String>,
    #[serde(alias = "target")]
    pub host: Option<String>,
    pub port: Option<u16>,
    pub description: Option<String>,
    pub exploit_available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialObservation {
    pub username: String,
    #[serde(alias = "password", alias = "hash")]
    pub secret: String,
    #[serde(alias = "host")]
    pub target: String,
    pub service: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnologyObservation {
    pub name: String,
    pub version: Option<String>,
    pub host: Option<String>,
}

/// Merge a batch into a copy of `existing`.
pub fn merge(existing: &FactStore, batch: &ObservedFacts) -> FactStore {
    let mut store = existing.clone();
    absorb(&mut store, batch);
    store
}

/// Merge a batch in place and report how much each category grew.
pub fn absorb(store: &mut FactStore, batch: &ObservedFacts) -> FactSummary {
    let before = store.summary();

    for host in batch.hosts.iter().flat_map(normalize_host) {
        store.hosts.insert(host);
    }

    for obs in &batch.services {
        let Some(service) = normalize_service(obs) else {
            continue;
        };
        // A port implies a live host.
        store.hosts.insert(host_for_key(&service.host));
        store.services.insert(service);
    }

    for vuln in batch.vulnerabilities.iter().map(normalize_vulnerability) {
        store.vulnerabilities.insert(vuln);
    }

    for cred in batch.credentials.iter().filter_map(normalize_credential) {
        store.credentials.insert(cred);
    }

    for tech in batch.technologies.iter().filter_map(normalize_technology) {
        store.technologies.insert(tech);
    }

    prune_claimed_aliases(store);
    store.summary().since(&before)
}

/// Fold one whole store into another.
pub fn union(left: &FactStore, right: &FactStore) -> FactStore {
    let mut store = left.clone();
    for host in &right.hosts {
        store.hosts.insert(host.clone());
    }
    for service in &right.services {
        store.services.insert(service.clone());
    }
    for vuln in &right.vulnerabilities {
        store.vulnerabilities.insert(vuln.clone());
    }
    for cred in &right.credentials {
        store.credentials.insert(cred.clone());
    }
    for tech in &right.technologies {
        store.technologies.insert(tech.clone());
    }
    prune_claimed_aliases(&mut store);
    store
}

/// Drop name-only hosts whose name an address-keyed host already carries.
///
/// Only bare aliases are dropped: they add nothing the claiming host does
/// not already record, so removing them keeps the join order-independent.
fn prune_claimed_aliases(store: &mut FactStore) {
    let claimed: BTreeSet<String> = store
        .hosts
        .iter()
        .filter(|h| h.address.is_some())
        .flat_map(|h| h.hostnames.iter().cloned())
        .collect();
    store
        .hosts
        .retain(|h| !(h.is_bare_alias() && claimed.contains(&h.key)));
}

fn host_for_key(key: &str) -> Host {
    if normalize_ip(key).is_some() {
        Host::from_address(key)
    } else {
        Host::from_hostname(key)
    }
}

fn normalize_host(obs: &HostObservation) -> Vec<Host> {
    let os = known_value(obs.os.as_deref());
    let mut hostnames: BTreeSet<String> = obs
        .hostnames
        .iter()
        .filter_map(|h| normalize_hostname(h))
        .collect();

    let ip = match obs.address.as_deref() {
        Some(raw) => match normalize_ip(raw) {
            Some(ip) => Some(ip),
            None => {
                // An "address" that is really a name.
                hostnames.extend(normalize_hostname(raw));
                None
            }
        },
        None => None,
    };

    match ip {
        Some(ip) => {
            let mut host = Host::from_address(ip);
            host.hostnames = hostnames;
            host.os = os;
            vec![host]
        }
        // Without an address each name stands alone.
        None => hostnames
            .into_iter()
            .map(|name| {
                let mut host = Host::from_hostname(name);
                host.os = os.clone();
                host
            })
            .collect(),
    }
}

fn normalize_service(obs: &ServiceObservation) -> Option<Service> {
    if obs.port == 0 {
        return None;
    }
    let host = host_key(&obs.host)?;
    let protocol = known_value(obs.protocol.as_deref())
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| "tcp".to_string());
    Some(Service {
        host,
        port: obs.port,
        protocol,
        service: known_value(obs.service.as_deref()).map(|s| s.to_lowercase()),
        version: known_value(obs.version.as_deref()),
    })
}

fn normalize_vulnerability(obs: &VulnerabilityObservation) -> Vulnerability {
    let cve = obs.cve.as_deref().and_then(normalize_cve);
    let kind = known_value(obs.kind.as_deref())
        .map(|k| k.to_lowercase())
        .or_else(|| cve.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let target = AffectedTarget {
        host: obs.host.as_deref().and_then(host_key),
        port: obs.port.filter(|p| *p != 0),
    };
    Vulnerability {
        cve,
        kind,
        severity: obs
            .severity
            .as_deref()
            .map(Severity::parse_lenient)
            .unwrap_or_default(),
        affected: BTreeSet::from([target]),
        description: known_value(obs.description.as_deref()),
        exploit_available: obs.exploit_available,
    }
}

fn normalize_credential(obs: &CredentialObservation) -> Option<Credential> {
    let username = obs.username.trim();
    if username.is_empty() || obs.secret.is_empty() {
        return None;
    }
    let target = host_key(&obs.target).unwrap_or_else(|| obs.target.trim().to_string());
    Some(Credential {
        username: username.to_string(),
        secret: obs.secret.clone(),
        target,
        service: known_value(obs.service.as_deref()).map(|s| s.to_lowercase()),
    })
}

fn normalize_technology(obs: &TechnologyObservation) -> Option<Technology> {
    let name = known_value(Some(&obs.name))?.to_lowercase();
    Some(Technology {
        name,
        host: obs.host.as_deref().and_then(host_key),
        version: known_value(obs.version.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(json: &str) -> ObservedFacts {
        serde_json::from_str(json).unwrap()
    }

    fn batch_a() -> ObservedFacts {
        batch(
            r#"{
                "hosts": ["192.168.1.1", {"ip": "192.168.1.10", "hostname": "web.lab"}],
                "ports": [
                    {"host": "192.168.1.10", "port": 80, "service": "http"},
                    {"host": "192.168.1.10", "port": 22, "service": "ssh", "version": "OpenSSH 8.9p1"}
                ],
                "vulnerabilities": [
                    {"cve_id": "cve-2021-41773", "name": "path traversal", "severity": "high",
                     "target": "192.168.1.10", "port": 80}
                ],
                "credentials": [
                    {"username": "admin", "password": "admin", "host": "192.168.1.10", "service": "http"}
                ]
            }"#,
        )
    }

    fn batch_b() -> ObservedFacts {
        batch(
            r#"{
                "hosts": [{"hostname": "WEB.lab"}, {"address": "192.168.001.010", "os": "Ubuntu 22.04"}],
                "services": [
                    {"host": "192.168.1.10", "port": 80, "service": "http", "version": "Apache 2.4.49"},
                    {"host": "192.168.1.10", "port": 22, "service": "ssh", "version": "unknown"}
                ],
                "vulnerabilities": [
                    {"cve": "CVE-2021-41773", "severity": "critical", "target": "192.168.1.10",
                     "port": 80, "exploit_available": true},
                    {"type": "default-credentials", "target": "192.168.1.10", "port": 80}
                ],
                "credentials": [
                    {"username": "admin", "secret": "admin", "target": "192.168.1.10"}
                ],
                "technologies": [{"name": "Apache", "version": "2.4.49", "host": "192.168.1.10"}]
            }"#,
        )
    }

    fn batch_c() -> ObservedFacts {
        batch(
            r#"{
                "hosts": [{"hostname": "db.lab", "os": "Linux"}, {"hostname": "web.lab"}],
                "ports": [{"host": "db.lab", "port": 5432, "protocol": "TCP", "service": "postgresql"}],
                "technologies": [{"name": "apache", "host": "192.168.1.10"}]
            }"#,
        )
    }

    // ==================== Identity ====================

    #[test]
    fn test_discovered_hosts_are_inserted_once() {
        let store = merge(
            &FactStore::new(),
            &ObservedFacts::hosts(["192.168.1.1", "192.168.1.10"]),
        );
        assert_eq!(store.hosts.len(), 2);
        assert_eq!(store.host_addresses(), vec!["192.168.1.1", "192.168.1.10"]);
    }

    #[test]
    fn test_host_spellings_share_identity() {
        let store = merge(
            &FactStore::new(),
            &ObservedFacts::hosts(["10.0.0.1", "010.000.000.001", " 10.0.0.1 "]),
        );
        assert_eq!(store.hosts.len(), 1);
    }

    #[test]
    fn test_hostnames_union_into_address_entry() {
        let store = merge(&merge(&FactStore::new(), &batch_a()), &batch_b());
        let web = store.hosts.get(&"192.168.1.10".to_string()).unwrap();
        assert!(web.hostnames.contains("web.lab"));
        assert_eq!(web.os.as_deref(), Some("Ubuntu 22.04"));
        // The bare "WEB.lab" observation was claimed by the address entry.
        assert!(!store.hosts.contains_key(&"web.lab".to_string()));
    }

    #[test]
    fn test_service_never_regresses_to_unknown() {
        let store = merge(&merge(&FactStore::new(), &batch_a()), &batch_b());
        let ssh = store
            .services
            .get(&("192.168.1.10".to_string(), 22, "tcp".to_string()))
            .unwrap();
        assert_eq!(ssh.version.as_deref(), Some("OpenSSH 8.9p1"));

        let http = store
            .services
            .get(&("192.168.1.10".to_string(), 80, "tcp".to_string()))
            .unwrap();
        assert_eq!(http.version.as_deref(), Some("Apache 2.4.49"));
    }

    #[test]
    fn test_port_implies_host() {
        let store = merge(&FactStore::new(), &batch_c());
        assert!(store.hosts.contains_key(&"db.lab".to_string()));
        assert_eq!(store.services.len(), 1);
        assert_eq!(store.services.iter().next().unwrap().protocol, "tcp");
    }

    #[test]
    fn test_cve_deduplicates_across_commands() {
        let store = merge(&merge(&FactStore::new(), &batch_a()), &batch_b());
        assert_eq!(store.vulnerabilities.len(), 2);
        let cve = store
            .vulnerabilities
            .iter()
            .find(|v| v.cve.as_deref() == Some("CVE-2021-41773"))
            .unwrap();
        assert_eq!(cve.severity, Severity::Critical);
        assert!(cve.exploit_available);
    }

    #[test]
    fn test_credentials_stored_once() {
        let store = merge(&merge(&FactStore::new(), &batch_a()), &batch_b());
        assert_eq!(store.credentials.len(), 1);
        assert_eq!(
            store.credentials.iter().next().unwrap().service.as_deref(),
            Some("http")
        );
    }

    #[test]
    fn test_invalid_observations_are_dropped() {
        let store = merge(
            &FactStore::new(),
            &batch(
                r#"{
                    "hosts": [{"os": "Linux"}],
                    "ports": [{"host": "", "port": 80}, {"host": "10.0.0.1", "port": 0}],
                    "credentials": [{"username": "", "password": "x", "host": "10.0.0.1"}],
                    "technologies": [{"name": "unknown"}]
                }"#,
            ),
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_absorb_reports_growth() {
        let mut store = FactStore::new();
        let delta = absorb(&mut store, &batch_a());
        assert_eq!(delta.hosts, 2);
        assert_eq!(delta.services, 2);

        let again = absorb(&mut store, &batch_a());
        assert_eq!(again.total(), 0);
    }

    // ==================== Algebraic properties ====================

    #[test]
    fn test_merge_is_idempotent() {
        for b in [batch_a(), batch_b(), batch_c()] {
            let once = merge(&FactStore::new(), &b);
            let twice = merge(&once, &b);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_merge_is_order_independent() {
        let batches = [batch_a(), batch_b(), batch_c()];
        for x in &batches {
            for y in &batches {
                let xy = merge(&merge(&FactStore::new(), x), y);
                let yx = merge(&merge(&FactStore::new(), y), x);
                assert_eq!(xy, yx);
            }
        }
    }

    #[test]
    fn test_merge_is_associative_over_stores() {
        let a = merge(&FactStore::new(), &batch_a());
        let b = merge(&FactStore::new(), &batch_b());
        let c = merge(&FactStore::new(), &batch_c());

        let left = union(&union(&a, &b), &c);
        let right = union(&a, &union(&b, &c));
        assert_eq!(left, right);

        let sequential = merge(&merge(&merge(&FactStore::new(), &batch_a()), &batch_b()), &batch_c());
        assert_eq!(left, sequential);
    }

    #[test]
    fn test_store_survives_serde() {
        let store = merge(&merge(&FactStore::new(), &batch_a()), &batch_c());
        let json = serde_json::to_string(&store).unwrap();
        let restored: FactStore = serde_json::from_str(&json).unwrap();
        assert_eq!(store, restored);
        assert!(restored.integrity_issues().is_empty());
    }
}
