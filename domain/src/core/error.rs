//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Command id already recorded: {0}")]
    DuplicateCommandId(String),

    #[error("Unknown command id: {0}")]
    UnknownCommand(String),

    #[error("Invalid transition for command {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Session state is structurally invalid: {0}")]
    StateCorruption(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
