//! Tool catalog assembly.
//!
//! The catalog is an explicit registration table built once at startup:
//!
//! 1. the built-in descriptors ([`builtin_tools`])
//! 2. descriptors from an optional TOML manifest, replacing built-ins of the
//!    same name
//! 3. tools listed as disabled are removed
//! 4. each remaining binary is looked up on `PATH`
//!
//! Availability feeds the session's `tools_available` fact and intent
//! resolution. It never blocks a command; the safety validator does that.

mod builtin;
mod manifest;

pub use builtin::builtin_tools;
pub use manifest::{ManifestError, load_manifest, parse_manifest};

use gauntlet_domain::tool::ToolCatalog;
use std::path::Path;
use tracing::{debug, info};

/// Build the catalog from built-ins, an optional manifest and a disable list.
///
/// `probe` decides whether a binary is installed; production code passes
/// [`binary_on_path`].
pub fn build_catalog(
    manifest: Option<&Path>,
    disabled: &[String],
    probe: impl Fn(&str) -> bool,
) -> Result<ToolCatalog, ManifestError> {
    let mut catalog = ToolCatalog::new();
    for tool in builtin_tools() {
        catalog.register(tool);
    }

    if let Some(path) = manifest {
        let tools = load_manifest(path)?;
        info!(path = %path.display(), tools = tools.len(), "Loaded tool manifest");
        for tool in tools {
            catalog.register(tool);
        }
    }

    for name in disabled {
        if catalog.remove(name).is_some() {
            debug!(tool = %name, "Tool disabled by configuration");
        }
    }

    let binaries: Vec<(String, String)> = catalog
        .tools()
        .iter()
        .map(|t| (t.name.clone(), t.binary.clone()))
        .collect();
    for (name, binary) in binaries {
        let available = probe(&binary);
        debug!(tool = %name, binary = %binary, available, "Probed tool");
        catalog.set_available(&name, available);
    }
    Ok(catalog)
}

/// Check if a command is available on the system
pub fn binary_on_path(binary: &str) -> bool {
    which::which(binary).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_domain::session::RedTeamPhase;

    #[test]
    fn test_builtins_with_probe() {
        let catalog = build_catalog(None, &[], |binary| binary == "nmap").unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.availability().get("nmap"), Some(&true));
        assert_eq!(catalog.availability().get("hydra"), Some(&false));
    }

    #[test]
    fn test_disabled_tools_are_removed() {
        let disabled = vec!["hydra".to_string(), "sqlmap".to_string()];
        let catalog = build_catalog(None, &disabled, |_| true).unwrap();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.resolve("ssh_brute").is_none());
        assert!(
            catalog
                .intents_for_phase(RedTeamPhase::Exploitation)
                .iter()
                .all(|i| i.tool != "hydra")
        );
    }

    #[test]
    fn test_manifest_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.toml");
        std::fs::write(
            &path,
            r#"
[[tools]]
name = "nmap"
binary = "/opt/nmap/bin/nmap"
category = "discovery"
phases = ["recon"]
safe_flags = ["-sn", "-Pn"]

[[tools.intents]]
intent = "host_discovery"
template = "/opt/nmap/bin/nmap -sn -Pn {target}"
required_params = ["target"]
"#,
        )
        .unwrap();

        let catalog = build_catalog(Some(&path), &[], |_| false).unwrap();
        assert_eq!(catalog.len(), 10);
        let resolved = catalog.resolve("host_discovery").unwrap();
        assert_eq!(resolved.binary, "/opt/nmap/bin/nmap");
        // The replaced descriptor no longer offers the other nmap intents.
        assert!(catalog.resolve("os_detection").is_none());
        // Allowlists are keyed by file name, which is what the validator sees.
        assert!(catalog.flag_whitelists()["nmap"].contains("-Pn"));
    }

    #[test]
    fn test_missing_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(build_catalog(Some(&path), &[], |_| true).is_err());
    }

    #[test]
    fn test_binary_on_path() {
        #[cfg(unix)]
        assert!(binary_on_path("sh"));
        assert!(!binary_on_path("definitely_not_a_command_123xyz"));
    }
}
