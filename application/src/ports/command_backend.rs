//! Command execution backend port
//!
//! Runs one rendered command string under a wall-clock limit.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Raw result of a command that ran to completion (any exit code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Backend-level failures, distinct from a non-zero exit code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The command exceeded its limit and was killed. Output captured up to
    /// that point is kept.
    #[error("Command timed out after {}s", .after.as_secs())]
    Timeout {
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to spawn command: {0}")]
    Spawn(String),

    #[error("I/O error while running command: {0}")]
    Io(String),
}

#[async_trait]
pub trait CommandBackend: Send + Sync {
    async fn execute(&self, command: &str, timeout: Duration)
    -> Result<ProcessOutput, BackendError>;
}

/// Liveness of the process that marked an execution record RUNNING.
pub trait ProcessLiveness: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Knows only about the current process; any other owner counts as gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentProcessLiveness;

impl ProcessLiveness for CurrentProcessLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        pid == std::process::id()
    }
}
