//! Command records and their execution lifecycle.

pub mod entities;

pub use entities::{
    CommandId, CommandOutcome, CommandRecord, CommandState, CommandStatus, CompletedCommand,
    ExecutionRecord, FailureReason,
};
