//! Logging infrastructure: the per-session structured event log.
//!
//! Provides [`JsonlSessionEventLogger`], a JSONL writer that implements the
//! [`SessionEventLogger`](gauntlet_application::SessionEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlSessionEventLogger;
