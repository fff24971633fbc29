//! Presentation layer for gauntlet
//!
//! This crate contains the CLI definition, the interactive approval gate,
//! the agent progress reporter and console/JSON output formatting.

pub mod agent;
pub mod cli;
pub mod output;

// Re-export commonly used types
pub use agent::{AgentProgressReporter, InteractiveApproval, SimpleAgentProgress};
pub use cli::commands::{Cli, Command};
pub use output::console::ConsoleFormatter;
