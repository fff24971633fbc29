//! Line-oriented fact extraction from well-known tool output.

use gauntlet_domain::facts::{
    CredentialObservation, HostObservation, ObservedFacts, ServiceObservation,
    TechnologyObservation, VulnerabilityObservation,
};
use regex::Regex;
use std::sync::LazyLock;

static NMAP_REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Nmap scan report for (?:([\w.-]+) \()?(\d{1,3}(?:\.\d{1,3}){3})\)?")
        .expect("valid nmap report regex")
});

static NMAP_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,5})/(tcp|udp)\s+open\s+([\w\-?/.]+)(?:\s+(.+?))?\s*$")
        .expect("valid nmap port regex")
});

static NMAP_OS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^OS details:\s*(.+?)\s*$").expect("valid nmap os regex"));

static MASSCAN_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Discovered open port (\d{1,5})/(tcp|udp) on (\d{1,3}(?:\.\d{1,3}){3})")
        .expect("valid masscan regex")
});

static HYDRA_LOGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)\]\[([\w-]+)\]\s+host:\s*(\S+)\s+login:\s*(\S+)\s+password:\s*(\S*)")
        .expect("valid hydra regex")
});

static NIKTO_FINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+ (?:OSVDB-(\d+)|(CVE-\d{4}-\d+)):\s*(.+?)\s*$").expect("valid nikto regex")
});

static NIKTO_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+ Target (IP|Port):\s*(\S+)").expect("valid nikto target regex")
});

static NIKTO_SERVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+ Server:\s*(.+?)\s*$").expect("valid nikto server regex"));

static WHATWEB_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][\w-]*)\[([^\]]*)\]").expect("valid whatweb regex")
});

static SQLMAP_INJECTABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)parameter '([^']+)' (?:is|appears to be) '?([^']*?)'? ?injectable")
        .expect("valid sqlmap regex")
});

/// whatweb plugins that describe the response rather than the stack.
const WHATWEB_NOISE: &[&str] = &[
    "Country",
    "IP",
    "Title",
    "Email",
    "Script",
    "UncommonHeaders",
    "Cookies",
    "HttpOnly",
    "RedirectLocation",
    "Meta-Author",
    "Meta-Refresh-Redirect",
    "X-UA-Compatible",
    "HTML5",
    "Frame",
    "PasswordField",
];

/// Facts found in the output of `tool`. `host` is the first target of the
/// command, used when the tool does not repeat it in its output.
pub fn parse(tool: &str, output: &str, host: Option<&str>) -> ObservedFacts {
    match tool {
        "nmap" => parse_nmap(output),
        "masscan" => parse_masscan(output),
        "hydra" => parse_hydra(output),
        "nikto" => parse_nikto(output, host),
        "whatweb" => parse_whatweb(output, host),
        "sqlmap" => parse_sqlmap(output, host),
        _ => ObservedFacts::default(),
    }
}

pub fn parse_nmap(output: &str) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    let mut current: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(caps) = NMAP_REPORT.captures(line) {
            let address = caps[2].to_string();
            facts.hosts.push(HostObservation {
                address: Some(address.clone()),
                hostnames: caps
                    .get(1)
                    .map(|m| vec![m.as_str().to_string()])
                    .unwrap_or_default(),
                os: None,
            });
            current = Some(address);
            continue;
        }
        let Some(host) = current.as_deref() else {
            continue;
        };
        if let Some(caps) = NMAP_PORT.captures(line) {
            let Ok(port) = caps[1].parse::<u16>() else {
                continue;
            };
            facts.services.push(ServiceObservation {
                host: host.to_string(),
                port,
                protocol: Some(caps[2].to_string()),
                service: Some(caps[3].to_string()),
                version: caps.get(4).map(|m| m.as_str().to_string()),
            });
        } else if let Some(caps) = NMAP_OS.captures(line) {
            if let Some(last) = facts.hosts.last_mut() {
                last.os = Some(caps[1].to_string());
            }
        }
    }
    facts
}

pub fn parse_masscan(output: &str) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    for caps in output.lines().filter_map(|l| MASSCAN_PORT.captures(l)) {
        let Ok(port) = caps[1].parse::<u16>() else {
            continue;
        };
        let host = caps[3].to_string();
        if !facts.hosts.iter().any(|h| h.address.as_deref() == Some(&host)) {
            facts.hosts.push(HostObservation {
                address: Some(host.clone()),
                ..Default::default()
            });
        }
        facts.services.push(ServiceObservation {
            host,
            port,
            protocol: Some(caps[2].to_string()),
            ..Default::default()
        });
    }
    facts
}

pub fn parse_hydra(output: &str) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    for caps in output.lines().filter_map(|l| HYDRA_LOGIN.captures(l)) {
        facts.credentials.push(CredentialObservation {
            username: caps[4].to_string(),
            secret: caps[5].to_string(),
            target: caps[3].to_string(),
            service: Some(caps[2].to_string()),
        });
    }
    facts
}

pub fn parse_nikto(output: &str, host: Option<&str>) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    let mut target = host.map(str::to_string);
    let mut port = None;

    for line in output.lines().map(str::trim) {
        if let Some(caps) = NIKTO_TARGET.captures(line) {
            match &caps[1] {
                "IP" => target = Some(caps[2].to_string()),
                _ => port = caps[2].parse::<u16>().ok(),
            }
        } else if let Some(caps) = NIKTO_SERVER.captures(line) {
            let (name, version) = split_product(&caps[1]);
            facts.technologies.push(TechnologyObservation {
                name,
                version,
                host: target.clone(),
            });
        } else if let Some(caps) = NIKTO_FINDING.captures(line) {
            facts.vulnerabilities.push(VulnerabilityObservation {
                cve: caps.get(2).map(|m| m.as_str().to_string()),
                kind: caps.get(1).map(|m| format!("OSVDB-{}", m.as_str())),
                host: target.clone(),
                port,
                description: Some(caps[3].to_string()),
                ..Default::default()
            });
        }
    }
    facts
}

pub fn parse_whatweb(output: &str, host: Option<&str>) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    for caps in output.lines().flat_map(|l| WHATWEB_PLUGIN.captures_iter(l)) {
        let name = &caps[1];
        if WHATWEB_NOISE.contains(&name) {
            continue;
        }
        if facts.technologies.iter().any(|t| t.name == name) {
            continue;
        }
        let value = &caps[2];
        let version = value
            .starts_with(|c: char| c.is_ascii_digit())
            .then(|| value.to_string());
        facts.technologies.push(TechnologyObservation {
            name: name.to_string(),
            version,
            host: host.map(str::to_string),
        });
    }
    facts
}

pub fn parse_sqlmap(output: &str, host: Option<&str>) -> ObservedFacts {
    let mut facts = ObservedFacts::default();
    for caps in output.lines().filter_map(|l| SQLMAP_INJECTABLE.captures(l)) {
        let technique = caps[2].trim();
        let description = if technique.is_empty() {
            format!("parameter '{}' is injectable", &caps[1])
        } else {
            format!("parameter '{}' is {} injectable", &caps[1], technique)
        };
        facts.vulnerabilities.push(VulnerabilityObservation {
            kind: Some("sql_injection".to_string()),
            severity: Some("high".to_string()),
            host: host.map(str::to_string),
            description: Some(description),
            exploit_available: true,
            ..Default::default()
        });
    }
    facts
}

/// `Apache/2.4.41 (Ubuntu)` → (`Apache`, `2.4.41`).
fn split_product(raw: &str) -> (String, Option<String>) {
    let product = raw.split_whitespace().next().unwrap_or(raw);
    match product.split_once('/') {
        Some((name, version)) if !version.is_empty() => {
            (name.to_string(), Some(version.to_string()))
        }
        _ => (product.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NMAP_PING_SWEEP: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2024-05-01 10:00 UTC
Nmap scan report for router.lan (192.168.1.1)
Host is up (0.0021s latency).
Nmap scan report for 192.168.1.10
Host is up (0.00040s latency).
Nmap done: 256 IP addresses (2 hosts up) scanned in 2.41 seconds
";

    const NMAP_SERVICES: &str = "\
Nmap scan report for 10.0.0.5
Host is up (0.00031s latency).
Not shown: 997 closed tcp ports (reset)
PORT     STATE SERVICE VERSION
22/tcp   open  ssh     OpenSSH 8.2p1 Ubuntu 4ubuntu0.5
80/tcp   open  http    Apache httpd 2.4.41
3306/tcp closed mysql
OS details: Linux 5.0 - 5.4
";

    #[test]
    fn test_nmap_ping_sweep_hosts() {
        let facts = parse_nmap(NMAP_PING_SWEEP);
        let addresses: Vec<_> = facts
            .hosts
            .iter()
            .filter_map(|h| h.address.as_deref())
            .collect();
        assert_eq!(addresses, vec!["192.168.1.1", "192.168.1.10"]);
        assert_eq!(facts.hosts[0].hostnames, vec!["router.lan".to_string()]);
        assert!(facts.services.is_empty());
    }

    #[test]
    fn test_nmap_open_ports_and_os() {
        let facts = parse_nmap(NMAP_SERVICES);
        assert_eq!(facts.services.len(), 2);
        let ssh = &facts.services[0];
        assert_eq!(ssh.host, "10.0.0.5");
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.service.as_deref(), Some("ssh"));
        assert_eq!(ssh.version.as_deref(), Some("OpenSSH 8.2p1 Ubuntu 4ubuntu0.5"));
        assert_eq!(facts.services[1].port, 80);
        assert_eq!(facts.hosts[0].os.as_deref(), Some("Linux 5.0 - 5.4"));
    }

    #[test]
    fn test_masscan_ports() {
        let output = "Discovered open port 443/tcp on 10.0.0.7\n\
                      Discovered open port 80/tcp on 10.0.0.7\n";
        let facts = parse_masscan(output);
        assert_eq!(facts.hosts.len(), 1);
        assert_eq!(facts.services.len(), 2);
        assert_eq!(facts.services[0].port, 443);
    }

    #[test]
    fn test_hydra_credentials() {
        let output = "[DATA] attacking ssh://10.0.0.5:22/\n\
                      [22][ssh] host: 10.0.0.5   login: admin   password: letmein\n\
                      1 of 1 target successfully completed, 1 valid password found\n";
        let facts = parse_hydra(output);
        assert_eq!(facts.credentials.len(), 1);
        let cred = &facts.credentials[0];
        assert_eq!(cred.username, "admin");
        assert_eq!(cred.secret, "letmein");
        assert_eq!(cred.target, "10.0.0.5");
        assert_eq!(cred.service.as_deref(), Some("ssh"));
    }

    #[test]
    fn test_nikto_findings_and_server() {
        let output = "\
- Nikto v2.1.6
+ Target IP:          10.0.0.5
+ Target Port:        8080
+ Server: Apache/2.4.41 (Ubuntu)
+ OSVDB-3092: /admin/: This might be interesting...
+ CVE-2003-1418: Apache leaks inodes via ETags
+ /: The X-Content-Type-Options header is not set.
";
        let facts = parse_nikto(output, None);
        assert_eq!(facts.technologies[0].name, "Apache");
        assert_eq!(facts.technologies[0].version.as_deref(), Some("2.4.41"));
        assert_eq!(facts.vulnerabilities.len(), 2);
        assert_eq!(facts.vulnerabilities[0].kind.as_deref(), Some("OSVDB-3092"));
        assert_eq!(facts.vulnerabilities[0].host.as_deref(), Some("10.0.0.5"));
        assert_eq!(facts.vulnerabilities[0].port, Some(8080));
        assert_eq!(facts.vulnerabilities[1].cve.as_deref(), Some("CVE-2003-1418"));
    }

    #[test]
    fn test_whatweb_technologies_skip_noise() {
        let output = "http://10.0.0.5 [200 OK] Apache[2.4.41], Country[RESERVED][ZZ], \
                      HTTPServer[Ubuntu Linux][Apache/2.4.41 (Ubuntu)], IP[10.0.0.5], \
                      JQuery[3.5.1], Title[Welcome]";
        let facts = parse_whatweb(output, Some("10.0.0.5"));
        let names: Vec<_> = facts.technologies.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Apache", "HTTPServer", "JQuery"]);
        assert_eq!(facts.technologies[0].version.as_deref(), Some("2.4.41"));
        assert_eq!(facts.technologies[1].version, None);
        assert_eq!(facts.technologies[2].host.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_sqlmap_injectable_parameter() {
        let output = "[INFO] GET parameter 'id' is 'MySQL >= 5.0 AND error-based' injectable\n";
        let facts = parse_sqlmap(output, Some("10.0.0.5"));
        assert_eq!(facts.vulnerabilities.len(), 1);
        let vuln = &facts.vulnerabilities[0];
        assert_eq!(vuln.kind.as_deref(), Some("sql_injection"));
        assert!(vuln.exploit_available);
        assert!(vuln.description.as_deref().unwrap().contains("'id'"));
    }

    #[test]
    fn test_unknown_tool_yields_nothing() {
        assert!(parse("gobuster", "/admin (Status: 301)", None).is_empty());
    }
}
