//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod agent_progress;
pub mod approval;
pub mod command_backend;
pub mod event_log;
pub mod oracle;
pub mod storage;
pub mod tool_catalog;
