//! Port for structured session event logging.
//!
//! Defines the [`SessionEventLogger`] trait for recording loop events
//! (decisions, verdicts, submissions, merges, rollbacks) to a per-session
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the session
//! timeline in a machine-readable format (JSONL).

use gauntlet_domain::session::SessionId;
use serde_json::Value;

/// A structured session event.
///
/// Each event has a type string and a JSON payload containing event-specific
/// fields. The adapter stamps the time when it writes the record.
pub struct SessionEvent {
    /// Event type identifier (e.g., "think", "safety_rejected", "submitted").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl SessionEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging session events.
///
/// The `log` method is intentionally synchronous and non-fallible so that
/// logging never disrupts the loop; adapters swallow write failures.
pub trait SessionEventLogger: Send + Sync {
    fn log(&self, session: &SessionId, event: SessionEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoSessionEventLogger;

impl SessionEventLogger for NoSessionEventLogger {
    fn log(&self, _session: &SessionId, _event: SessionEvent) {}
}
