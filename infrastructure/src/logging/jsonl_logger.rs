//! JSONL file writer for session events.
//!
//! Each [`SessionEvent`] is serialized as a single JSON line with `type` and
//! `timestamp` fields, appended to `<root>/<session_id>/events.jsonl`. Files
//! are opened in append mode, so a resumed session extends its timeline.

use crate::storage::fs::path_component;
use gauntlet_application::{SessionEvent, SessionEventLogger};
use gauntlet_domain::session::SessionId;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const EVENTS_FILE: &str = "events.jsonl";

/// JSONL session event logger, one file per session.
///
/// Thread-safe via a mutex over the open writers. Every line is flushed as
/// it is written; writers are also flushed on `Drop`.
pub struct JsonlSessionEventLogger {
    root: PathBuf,
    writers: Mutex<HashMap<SessionId, BufWriter<File>>>,
}

impl JsonlSessionEventLogger {
    /// Log under the sessions root shared with the stores.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Path of a session's event log.
    pub fn path(&self, session: &SessionId) -> Option<PathBuf> {
        let dir = path_component(session.as_str()).ok()?;
        Some(self.root.join(dir).join(EVENTS_FILE))
    }

    fn open(path: &Path) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn record(session: &SessionId, event: SessionEvent) -> Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        // Merge the payload with type + timestamp
        match event.payload {
            Value::Object(mut map) => {
                map.insert(
                    "type".to_string(),
                    Value::String(event.event_type.to_string()),
                );
                map.insert("timestamp".to_string(), Value::String(timestamp));
                map.entry("session_id")
                    .or_insert_with(|| Value::String(session.to_string()));
                Value::Object(map)
            }
            other => serde_json::json!({
                "type": event.event_type,
                "timestamp": timestamp,
                "session_id": session.as_str(),
                "data": other,
            }),
        }
    }
}

impl SessionEventLogger for JsonlSessionEventLogger {
    fn log(&self, session: &SessionId, event: SessionEvent) {
        let Some(path) = self.path(session) else {
            warn!(session_id = %session, "Session id is not a valid directory name; event dropped");
            return;
        };
        let Ok(line) = serde_json::to_string(&Self::record(session, event)) else {
            return;
        };

        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        if !writers.contains_key(session) {
            match Self::open(&path) {
                Ok(writer) => {
                    writers.insert(session.clone(), writer);
                }
                Err(e) => {
                    warn!(
                        session_id = %session,
                        path = %path.display(),
                        error = %e,
                        "Could not open session event log"
                    );
                    return;
                }
            }
        }
        if let Some(writer) = writers.get_mut(session) {
            // JSONL is append-only; flush each line for crash safety.
            if let Err(e) = writeln!(writer, "{}", line).and_then(|()| writer.flush()) {
                warn!(session_id = %session, error = %e, "Could not write session event");
            }
        }
    }
}

impl Drop for JsonlSessionEventLogger {
    fn drop(&mut self) {
        let writers = self.writers.get_mut().unwrap_or_else(|e| e.into_inner());
        for writer in writers.values_mut() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonlSessionEventLogger::new(dir.path());
        let session = SessionId::new("session-a");

        logger.log(
            &session,
            SessionEvent::new(
                "submitted",
                json!({"command_id": "cmd-0001", "command": "nmap -sn 10.0.0.0/24"}),
            ),
        );
        logger.log(
            &session,
            SessionEvent::new("phase_change", json!({"from": "recon", "to": "enumeration"})),
        );

        let path = logger.path(&session).unwrap();
        assert_eq!(path, dir.path().join("session-a").join(EVENTS_FILE));
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.get("timestamp").is_some());
            assert_eq!(line["session_id"], "session-a");
        }
        assert_eq!(lines[0]["type"], "submitted");
        assert_eq!(lines[0]["command_id"], "cmd-0001");
        assert_eq!(lines[1]["to"], "enumeration");
    }

    #[test]
    fn test_sessions_get_separate_files_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let a = SessionId::new("session-a");
        let b = SessionId::new("session-b");
        {
            let logger = JsonlSessionEventLogger::new(dir.path());
            logger.log(&a, SessionEvent::new("think", json!({})));
            logger.log(&b, SessionEvent::new("think", json!({})));
        }
        // A new process appends to the existing timeline.
        let logger = JsonlSessionEventLogger::new(dir.path());
        logger.log(&a, SessionEvent::new("plan", json!({"intent": "host_discovery"})));

        let a_lines = read_lines(&logger.path(&a).unwrap());
        assert_eq!(a_lines.len(), 2);
        assert_eq!(a_lines[1]["type"], "plan");
        assert_eq!(read_lines(&logger.path(&b).unwrap()).len(), 1);
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonlSessionEventLogger::new(dir.path());
        let session = SessionId::new("session-a");
        logger.log(&session, SessionEvent::new("note", json!("just a string")));

        let lines = read_lines(&logger.path(&session).unwrap());
        assert_eq!(lines[0]["type"], "note");
        assert_eq!(lines[0]["data"], "just a string");
    }

    #[test]
    fn test_traversal_id_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonlSessionEventLogger::new(dir.path().join("agents"));
        let session = SessionId::new("../escape");
        assert!(logger.path(&session).is_none());
        logger.log(&session, SessionEvent::new("think", json!({})));
        assert!(!dir.path().join("escape").exists());
    }
}
