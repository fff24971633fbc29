//! Configuration file loading for gauntlet
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `GAUNTLET_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./gauntlet.toml` or `./.gauntlet.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/gauntlet/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAgentConfig, FileConfig, FileExecutionConfig, FileOracleConfig, FileSafetyConfig,
    FileStorageConfig, FileToolsConfig, OracleBackend,
};
pub use loader::ConfigLoader;
