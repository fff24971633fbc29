//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod execution_tracker;
pub mod oracle_client;
pub mod run_agent;
pub mod session_manager;
pub(crate) mod shared;
pub mod state_recovery;
