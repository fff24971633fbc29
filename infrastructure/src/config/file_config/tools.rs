//! Tools configuration from TOML (`[tools]` section)
//!
//! The built-in catalog covers common recon and web tooling. A manifest
//! adds tools or replaces built-in descriptors by name:
//!
//! ```toml
//! [tools]
//! manifest = "~/.config/gauntlet/tools.toml"
//! disabled = ["hydra"]
//! ```

use gauntlet_domain::config::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// TOML file with extra `[[tools]]` descriptors
    pub manifest: Option<PathBuf>,
    /// Tool names removed from the catalog
    pub disabled: Vec<String>,
}

impl FileToolsConfig {
    /// Manifest path with a leading `~/` expanded.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        let path = self.manifest.as_ref()?;
        match path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(path.clone()),
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        match self.manifest_path() {
            Some(path) if !path.is_file() => vec![ConfigIssue::error(
                ConfigIssueCode::ManifestUnreadable {
                    path: path.display().to_string(),
                },
                format!("tools.manifest: {} does not exist", path.display()),
            )],
            _ => vec![],
        }
    }
}
