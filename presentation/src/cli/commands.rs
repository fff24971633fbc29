//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for gauntlet
#[derive(Parser, Debug)]
#[command(name = "gauntlet")]
#[command(author, version, about = "Oracle-driven red-team agent with a human approval gate")]
#[command(long_about = r#"
Gauntlet drives an authorized security assessment through four phases
(recon, enumeration, vulnerability, exploitation). Each cycle the oracle
decides what to do next; every command it proposes passes the safety
validator and, unless disabled, a human approval prompt before it runs.

Configuration files are loaded from (in priority order):
1. GAUNTLET_* environment variables
2. --config <path>     Explicit config file
3. ./gauntlet.toml     Project-level config
4. ~/.config/gauntlet/config.toml   Global config

Example:
  gauntlet start "map the lab network 192.168.56.0/24" --scope 192.168.56.0/24
  gauntlet run cmd-0001 --session session-20240501-101500-123456
  gauntlet resume session-20240501-101500-123456 --wait
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new session for a goal
    Start {
        /// What the engagement should achieve, including its targets
        goal: String,

        /// Allowed network, address or hostname (repeatable); added to
        /// `safety.allowed_networks`
        #[arg(short, long, value_name = "CIDR")]
        scope: Vec<String>,

        /// Approve every command the safety validator accepts
        #[arg(long)]
        auto_approve: bool,

        /// Run submitted commands and keep cycling instead of suspending
        #[arg(short, long)]
        wait: bool,
    },

    /// Continue a stored session
    Resume {
        session: String,

        #[arg(short, long, value_name = "CIDR")]
        scope: Vec<String>,

        #[arg(long)]
        auto_approve: bool,

        #[arg(short, long)]
        wait: bool,
    },

    /// Run a submitted command
    Run {
        /// Command id (e.g. cmd-0001)
        command: String,

        #[arg(long, value_name = "SESSION")]
        session: String,
    },

    /// Short status of a session
    Status { session: String },

    /// Full report of a session
    Show {
        session: String,

        /// Print the session view as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored sessions
    List,

    /// List catalog tools and whether their binaries are installed
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_with_scopes() {
        let cli = Cli::parse_from([
            "gauntlet",
            "-vv",
            "start",
            "scan 10.0.0.0/24",
            "--scope",
            "10.0.0.0/24",
            "-s",
            "lab.internal",
            "--wait",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Start {
                goal, scope, wait, auto_approve,
            } => {
                assert_eq!(goal, "scan 10.0.0.0/24");
                assert_eq!(scope, vec!["10.0.0.0/24", "lab.internal"]);
                assert!(wait);
                assert!(!auto_approve);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_session() {
        assert!(Cli::try_parse_from(["gauntlet", "run", "cmd-0001"]).is_err());
        let cli = Cli::parse_from(["gauntlet", "run", "cmd-0001", "--session", "s-1"]);
        assert!(matches!(cli.command, Command::Run { .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gauntlet", "show", "s-1", "--json", "--config", "x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Show { json: true, .. }));
    }
}
