//! Built-in tool registration table.
//!
//! | Tool | Category | Phases |
//! |------|----------|--------|
//! | nmap | discovery | recon, enumeration |
//! | masscan | discovery | recon |
//! | curl | web | recon, enumeration, vulnerability |
//! | whatweb | enumeration | enumeration, vulnerability |
//! | gobuster | web | enumeration, vulnerability |
//! | nikto | web | vulnerability |
//! | enum4linux | enumeration | enumeration |
//! | smbclient | enumeration | enumeration, exploitation |
//! | sqlmap | exploitation | vulnerability, exploitation |
//! | hydra | exploitation | exploitation |

use gauntlet_domain::session::RedTeamPhase::{self, *};
use gauntlet_domain::tool::{IntentTemplate, ToolCategory, ToolDescriptor};

const COMMON_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
const PASSWORD_WORDLIST: &str = "/usr/share/wordlists/rockyou.txt";

/// Every built-in descriptor, in registration order.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        nmap(),
        masscan(),
        curl(),
        whatweb(),
        gobuster(),
        nikto(),
        enum4linux(),
        smbclient(),
        sqlmap(),
        hydra(),
    ]
}

fn intent(name: &str, template: &str, description: &str, required: &[&str]) -> IntentTemplate {
    IntentTemplate::new(name, template)
        .with_description(description)
        .with_required(required)
}

fn tool(
    name: &str,
    category: ToolCategory,
    phases: &[RedTeamPhase],
    description: &str,
) -> ToolDescriptor {
    ToolDescriptor::new(name, category)
        .with_phases(phases)
        .with_description(description)
}

fn nmap() -> ToolDescriptor {
    tool(
        "nmap",
        ToolCategory::Discovery,
        &[Recon, Enumeration],
        "Network discovery and port scanning",
    )
    .requires_root()
    .with_intent(intent(
        "host_discovery",
        "nmap -sn {target}",
        "Ping sweep to find live hosts",
        &["target"],
    ))
    .with_intent(intent(
        "port_scan_quick",
        "nmap -sS --top-ports 100 {target}",
        "SYN scan of the 100 most common ports",
        &["target"],
    ))
    .with_intent(intent(
        "port_scan_full",
        "nmap -sS -p- {target}",
        "SYN scan of all 65535 ports",
        &["target"],
    ))
    .with_intent(intent(
        "service_detection",
        "nmap -sV -p {ports} {target}",
        "Service and version detection on known ports",
        &["target", "ports"],
    ))
    .with_intent(intent(
        "os_detection",
        "nmap -O {target}",
        "Operating system fingerprinting",
        &["target"],
    ))
    .with_safe_flags(&[
        "-sn", "-sS", "-sT", "-sV", "-p-", "-p", "--top-ports", "-O", "-A", "-T4", "-Pn", "-n",
    ])
}

fn masscan() -> ToolDescriptor {
    tool(
        "masscan",
        ToolCategory::Discovery,
        &[Recon],
        "Ultra-fast port scanner",
    )
    .requires_root()
    .with_intent(
        intent(
            "fast_port_scan",
            "masscan {target} -p{ports} --rate={rate}",
            "High-rate scan of a port range",
            &["target"],
        )
        .with_default("ports", "1-1000")
        .with_default("rate", "1000"),
    )
    .with_intent(
        intent(
            "full_port_scan",
            "masscan {target} -p1-65535 --rate={rate}",
            "High-rate scan of every port",
            &["target"],
        )
        .with_default("rate", "1000"),
    )
    .with_safe_flags(&["-p", "--rate"])
}

fn curl() -> ToolDescriptor {
    tool(
        "curl",
        ToolCategory::Web,
        &[Recon, Enumeration, Vulnerability],
        "HTTP client for web requests and API enumeration",
    )
    .with_intent(intent(
        "web_probe",
        "curl -I -L -k {url}",
        "Check whether a web service answers",
        &["url"],
    ))
    .with_intent(intent(
        "web_headers",
        "curl -v -s -k {url} -o /dev/null",
        "Dump request and response headers",
        &["url"],
    ))
    .with_intent(intent(
        "web_get",
        "curl -L -k {url}",
        "Fetch a page",
        &["url"],
    ))
    .with_intent(intent(
        "api_test",
        "curl -s -k {url} -H 'Accept: application/json'",
        "Probe an API endpoint for JSON",
        &["url"],
    ))
    .with_safe_flags(&["-I", "-L", "-s", "-v", "-X", "-H", "-A", "-k", "--head", "-o"])
}

fn whatweb() -> ToolDescriptor {
    tool(
        "whatweb",
        ToolCategory::Enumeration,
        &[Enumeration, Vulnerability],
        "Web technology fingerprinting",
    )
    .with_intent(intent(
        "web_fingerprint",
        "whatweb {url}",
        "Identify the web stack",
        &["url"],
    ))
    .with_intent(intent(
        "tech_detection",
        "whatweb -v {url}",
        "Verbose technology report",
        &["url"],
    ))
    .with_intent(intent(
        "aggressive_scan",
        "whatweb -a 3 {url}",
        "Aggressive fingerprinting",
        &["url"],
    ))
    .with_safe_flags(&["-v", "-a", "-q"])
}

fn gobuster() -> ToolDescriptor {
    tool(
        "gobuster",
        ToolCategory::Web,
        &[Enumeration, Vulnerability],
        "Directory and virtual host brute-forcing",
    )
    .with_intent(
        intent(
            "dir_enum",
            "gobuster dir -u {url} -w {wordlist} -q -k",
            "Brute-force directories",
            &["url"],
        )
        .with_default("wordlist", COMMON_WORDLIST),
    )
    .with_intent(
        intent(
            "dir_enum_extensions",
            "gobuster dir -u {url} -w {wordlist} -x {extensions} -q -k",
            "Brute-force directories and files with extensions",
            &["url"],
        )
        .with_default("wordlist", COMMON_WORDLIST)
        .with_default("extensions", "php,html,txt"),
    )
    .with_intent(
        intent(
            "vhost_enum",
            "gobuster vhost -u {url} -w {wordlist} -q -k",
            "Brute-force virtual hosts",
            &["url"],
        )
        .with_default("wordlist", COMMON_WORDLIST),
    )
    .with_safe_flags(&["-u", "-w", "-t", "-q", "-k", "-x", "--wildcard"])
}

fn nikto() -> ToolDescriptor {
    tool(
        "nikto",
        ToolCategory::Web,
        &[Vulnerability],
        "Web server vulnerability scanner",
    )
    .with_intent(
        intent(
            "web_vuln_scan",
            "nikto -h {target} -p {port} -Tuning x",
            "Full web server scan",
            &["target"],
        )
        .with_default("port", "80"),
    )
    .with_intent(
        intent(
            "quick_web_scan",
            "nikto -h {target} -p {port}",
            "Default web server checks",
            &["target"],
        )
        .with_default("port", "80"),
    )
    .with_safe_flags(&[
        "-h", "-p", "-ssl", "-nossl", "-Tuning", "-Display", "-o", "-Format",
    ])
}

fn enum4linux() -> ToolDescriptor {
    tool(
        "enum4linux",
        ToolCategory::Enumeration,
        &[Enumeration],
        "SMB enumeration for Windows and Samba hosts",
    )
    .with_intent(intent(
        "enum_users",
        "enum4linux -U {target}",
        "List users",
        &["target"],
    ))
    .with_intent(intent(
        "enum_shares",
        "enum4linux -S {target}",
        "List shares",
        &["target"],
    ))
    .with_intent(intent(
        "enum_groups",
        "enum4linux -G {target}",
        "List groups",
        &["target"],
    ))
    .with_intent(intent(
        "enum_all",
        "enum4linux -a {target}",
        "Run every simple enumeration",
        &["target"],
    ))
    .with_safe_flags(&["-U", "-S", "-G", "-a"])
}

fn smbclient() -> ToolDescriptor {
    tool(
        "smbclient",
        ToolCategory::Enumeration,
        &[Enumeration, Exploitation],
        "SMB client",
    )
    .with_intent(intent(
        "list_shares",
        "smbclient -L //{target} -N",
        "Anonymous share listing",
        &["target"],
    ))
    .with_intent(intent(
        "list_files",
        "smbclient //{target}/{share} -N -c ls",
        "List files in a share",
        &["target", "share"],
    ))
    .with_intent(intent(
        "check_access",
        "smbclient //{target}/{share} -N -c ls",
        "Check anonymous access to a share",
        &["target", "share"],
    ))
    .with_safe_flags(&["-L", "-N", "-U", "-c"])
}

fn sqlmap() -> ToolDescriptor {
    tool(
        "sqlmap",
        ToolCategory::Exploitation,
        &[Vulnerability, Exploitation],
        "SQL injection detection and exploitation",
    )
    .with_intent(intent(
        "test_injection",
        "sqlmap -u {url} --batch",
        "Test a URL for SQL injection",
        &["url"],
    ))
    .with_intent(intent(
        "enumerate_databases",
        "sqlmap -u {url} --batch --dbs",
        "List databases through an injection",
        &["url"],
    ))
    .with_intent(intent(
        "dump_tables",
        "sqlmap -u {url} --batch --tables",
        "List tables through an injection",
        &["url"],
    ))
    .with_safe_flags(&["-u", "--batch", "--dbs", "--tables"])
}

fn hydra() -> ToolDescriptor {
    let brute = |name: &str, scheme: &str, description: &str| {
        intent(
            name,
            &format!("hydra -l {{username}} -P {{wordlist}} -t 4 {}://{{target}}", scheme),
            description,
            &["username", "target"],
        )
        .with_default("wordlist", PASSWORD_WORDLIST)
    };
    tool(
        "hydra",
        ToolCategory::Exploitation,
        &[Exploitation],
        "Password brute-forcing for network services",
    )
    .with_intent(brute("ssh_brute", "ssh", "Brute-force SSH logins"))
    .with_intent(brute("ftp_brute", "ftp", "Brute-force FTP logins"))
    .with_intent(brute("http_brute", "http-get", "Brute-force HTTP basic auth"))
    .with_intent(brute("rdp_brute", "rdp", "Brute-force RDP logins"))
    .with_safe_flags(&["-l", "-L", "-p", "-P", "-t", "-f", "-s"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_domain::tool::ToolCatalog;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    fn catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        for tool in builtin_tools() {
            catalog.register(tool);
        }
        catalog
    }

    fn params(value: serde_json::Value) -> BTreeMap<String, serde_json::Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ten_tools_with_unique_intents() {
        let tools = builtin_tools();
        assert_eq!(tools.len(), 10);

        let mut seen = BTreeSet::new();
        for tool in &tools {
            assert!(!tool.phases.is_empty(), "{} has no phases", tool.name);
            for template in &tool.intents {
                assert!(seen.insert(template.intent.clone()), "duplicate {}", template.intent);
            }
        }
    }

    #[test]
    fn test_every_template_placeholder_is_required_or_defaulted() {
        for tool in builtin_tools() {
            for template in &tool.intents {
                for name in template.placeholders() {
                    assert!(
                        template.required_params.contains(&name)
                            || template.defaults.contains_key(&name),
                        "{}:{} leaves {{{}}} unfilled",
                        tool.name,
                        template.intent,
                        name
                    );
                }
            }
        }
    }

    #[test]
    fn test_host_discovery_renders_for_the_recon_scenario() {
        let command = catalog()
            .render("host_discovery", &params(json!({ "target": "192.168.1.0/24" })))
            .unwrap()
            .1;
        assert_eq!(command, "nmap -sn 192.168.1.0/24");
    }

    #[test]
    fn test_defaults_fill_optional_placeholders() {
        let command = catalog()
            .render("fast_port_scan", &params(json!({ "target": "10.0.0.1" })))
            .unwrap()
            .1;
        assert_eq!(command, "masscan 10.0.0.1 -p1-1000 --rate=1000");

        let command = catalog()
            .render(
                "ssh_brute",
                &params(json!({ "target": "10.0.0.5", "username": "root" })),
            )
            .unwrap()
            .1;
        assert_eq!(
            command,
            "hydra -l root -P /usr/share/wordlists/rockyou.txt -t 4 ssh://10.0.0.5"
        );
    }

    #[test]
    fn test_missing_required_parameter_is_invalid() {
        let catalog = catalog();
        assert!(!catalog.validate("service_detection", &params(json!({ "target": "10.0.0.1" }))));
        assert!(catalog.validate(
            "service_detection",
            &params(json!({ "target": "10.0.0.1", "ports": "22,80" }))
        ));
    }

    #[test]
    fn test_recon_offers_discovery_intents() {
        let intents: Vec<String> = catalog()
            .intents_for_phase(RedTeamPhase::Recon)
            .into_iter()
            .map(|i| i.intent)
            .collect();
        assert!(intents.contains(&"host_discovery".to_string()));
        assert!(intents.contains(&"fast_port_scan".to_string()));
        assert!(!intents.contains(&"ssh_brute".to_string()));
    }
}
