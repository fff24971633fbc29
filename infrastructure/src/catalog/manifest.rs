//! Operator tool manifest.
//!
//! # Example
//!
//! ```toml
//! [[tools]]
//! name = "feroxbuster"
//! binary = "feroxbuster"
//! category = "web"
//! phases = ["enumeration"]
//! safe_flags = ["-u", "-w", "-q"]
//! description = "Recursive content discovery"
//!
//! [[tools.intents]]
//! intent = "recursive_dir_enum"
//! template = "feroxbuster -u {url} -w {wordlist} -q"
//! required_params = ["url"]
//! defaults = { wordlist = "/usr/share/wordlists/dirb/common.txt" }
//! ```
//!
//! A manifest entry with the name of a built-in replaces it.

use gauntlet_domain::tool::ToolDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Cannot read tool manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid tool manifest {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Parse manifest text.
pub fn parse_manifest(text: &str, path: &Path) -> Result<Vec<ToolDescriptor>, ManifestError> {
    let manifest: Manifest = toml::from_str(text).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    for tool in &manifest.tools {
        if tool.intents.is_empty() {
            return Err(ManifestError::Parse {
                path: path.to_path_buf(),
                message: format!("tool '{}' declares no intents", tool.name),
            });
        }
    }
    Ok(manifest.tools)
}

pub fn load_manifest(path: &Path) -> Result<Vec<ToolDescriptor>, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text, path)
}
