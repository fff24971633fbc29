//! Infrastructure layer for gauntlet
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, plus configuration file loading and the
//! tool catalog assembly.

pub mod catalog;
pub mod config;
pub mod logging;
pub mod oracle;
pub mod process;
pub mod storage;

// Re-export commonly used types
pub use catalog::{ManifestError, binary_on_path, build_catalog, builtin_tools};
pub use config::{ConfigLoader, FileConfig, OracleBackend};
pub use logging::JsonlSessionEventLogger;
pub use oracle::{EmptyOracleCommand, HeuristicOracle, ProcessOracle};
pub use process::{PidLiveness, ProcessBackend};
pub use storage::{FileExecutionStore, FileSnapshotStore, sessions_root};
