//! Identity normalization for facts.
//!
//! Two observations of the same entity must produce the same key no matter
//! how the oracle spelled them, so every key passes through here first.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Canonical dotted form of an IPv4 address, or compressed form of IPv6.
///
/// Leading zeros in IPv4 octets are accepted (`192.168.001.010` becomes
/// `192.168.1.10`). Returns `None` for anything that is not an address.
pub fn normalize_ip(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let octets: Vec<&str> = raw.split('.').collect();
    if octets.len() == 4 {
        let mut parsed = [0u8; 4];
        for (slot, octet) in parsed.iter_mut().zip(&octets) {
            if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            *slot = octet.parse().ok()?;
        }
        return Some(Ipv4Addr::from(parsed).to_string());
    }

    raw.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<Ipv6Addr>()
        .ok()
        .map(|ip| ip.to_string())
}

/// Lowercase hostname without a trailing root dot.
pub fn normalize_hostname(raw: &str) -> Option<String> {
    let host = raw.trim().trim_end_matches('.').to_lowercase();
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
    valid.then_some(host)
}

/// Identity of a host reference: the normalized IP if it is one, else the
/// normalized hostname.
pub fn host_key(raw: &str) -> Option<String> {
    normalize_ip(raw).or_else(|| normalize_hostname(raw))
}

/// Upper-cased CVE identifier, if the text looks like one.
pub fn normalize_cve(raw: &str) -> Option<String> {
    let cve = raw.trim().to_uppercase();
    let mut parts = cve.splitn(3, '-');
    let well_formed = parts.next() == Some("CVE")
        && parts
            .next()
            .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()))
        && parts
            .next()
            .is_some_and(|seq| seq.len() >= 4 && seq.bytes().all(|b| b.is_ascii_digit()));
    well_formed.then_some(cve)
}

/// Drop empty and placeholder values the oracle uses for "don't know".
pub fn known_value(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    match value.to_lowercase().as_str() {
        "" | "unknown" | "n/a" | "none" | "null" | "?" => None,
        _ => Some(value.to_string()),
    }
}

/// Join two optional descriptive values.
///
/// A known value always beats an unknown one; between two known values the
/// more specific (longer) one wins, with a lexicographic tie-break so the
/// result does not depend on which arrived first.
pub fn join_specific(current: &mut Option<String>, incoming: &Option<String>) {
    let Some(incoming) = incoming else {
        return;
    };
    match current {
        None => *current = Some(incoming.clone()),
        Some(existing) => {
            if (incoming.len(), incoming.as_str()) > (existing.len(), existing.as_str()) {
                *existing = incoming.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ipv4_leading_zeros() {
        assert_eq!(normalize_ip("192.168.001.010").as_deref(), Some("192.168.1.10"));
        assert_eq!(normalize_ip(" 10.0.0.1 ").as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_normalize_ip_rejects_non_addresses() {
        assert!(normalize_ip("256.1.1.1").is_none());
        assert!(normalize_ip("web.example.com").is_none());
        assert!(normalize_ip("10.0.0").is_none());
        assert!(normalize_ip("").is_none());
    }

    #[test]
    fn test_normalize_ipv6_compresses() {
        assert_eq!(normalize_ip("fe80:0:0:0:0:0:0:1").as_deref(), Some("fe80::1"));
    }

    #[test]
    fn test_host_key_prefers_ip() {
        assert_eq!(host_key("010.0.0.5").as_deref(), Some("10.0.0.5"));
        assert_eq!(host_key("WEB.Example.COM.").as_deref(), Some("web.example.com"));
        assert!(host_key("not a host").is_none());
    }

    #[test]
    fn test_normalize_cve() {
        assert_eq!(
            normalize_cve(" cve-2021-44228 ").as_deref(),
            Some("CVE-2021-44228")
        );
        assert!(normalize_cve("CVE-21-1").is_none());
        assert!(normalize_cve("sql injection").is_none());
    }

    #[test]
    fn test_known_value_filters_placeholders() {
        assert_eq!(known_value(Some("Apache 2.4")).as_deref(), Some("Apache 2.4"));
        assert!(known_value(Some("unknown")).is_none());
        assert!(known_value(Some("  ")).is_none());
        assert!(known_value(None).is_none());
    }

    #[test]
    fn test_join_specific_never_regresses() {
        let mut value = Some("OpenSSH 8.9p1".to_string());
        join_specific(&mut value, &None);
        assert_eq!(value.as_deref(), Some("OpenSSH 8.9p1"));

        join_specific(&mut value, &Some("OpenSSH".to_string()));
        assert_eq!(value.as_deref(), Some("OpenSSH 8.9p1"));
    }

    #[test]
    fn test_join_specific_is_order_independent() {
        let a = Some("nginx".to_string());
        let b = Some("httpd".to_string());

        let mut left = a.clone();
        join_specific(&mut left, &b);
        let mut right = b.clone();
        join_specific(&mut right, &a);
        assert_eq!(left, right);
    }
}
