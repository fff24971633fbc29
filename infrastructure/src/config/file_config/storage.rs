//! Storage configuration from TOML (`[storage]` section)

use gauntlet_application::DEFAULT_BACKUP_RETENTION;
use gauntlet_domain::config::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw storage configuration from TOML
///
/// # Example
///
/// ```toml
/// [storage]
/// data_dir = "/var/lib/gauntlet"   # default: $XDG_DATA_HOME/gauntlet
/// backup_retention = 5             # state backups kept per session
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub data_dir: Option<PathBuf>,
    pub backup_retention: usize,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            backup_retention: DEFAULT_BACKUP_RETENTION,
        }
    }
}

impl FileStorageConfig {
    /// Configured data directory, else the platform data dir, else
    /// `./.gauntlet`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("gauntlet")))
            .unwrap_or_else(|| PathBuf::from(".gauntlet"))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        if self.backup_retention == 0 {
            vec![ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "storage.backup_retention".to_string(),
                },
                "storage.backup_retention is 0; a corrupted state file cannot be rolled back",
            )]
        } else {
            vec![]
        }
    }
}
