//! Fact Store and Fact Merger.
//!
//! - [`entities`]: categorized, identity-keyed fact sets
//! - [`identity`]: normalization of addresses, hostnames and CVE ids
//! - [`merger`]: the pure, order-independent merge of OBSERVE output

pub mod entities;
pub mod identity;
pub mod merger;

pub use entities::{
    AffectedTarget, Credential, Fact, FactSet, FactStore, FactSummary, Host, Service, Severity,
    Technology, Vulnerability, VulnerabilityKey,
};
pub use merger::{
    CredentialObservation, HostObservation, ObservedFacts, ServiceObservation,
    TechnologyObservation, VulnerabilityObservation, absorb, merge, union,
};
