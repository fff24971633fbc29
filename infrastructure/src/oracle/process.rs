//! Oracle bridged to an external program over stdio.
//!
//! Each call spawns the configured command, writes one JSON request to its
//! stdin and reads the answer from its stdout:
//!
//! ```text
//! gauntlet ──stdin──▶ {"call": "plan", "instructions": "...", "context": {...}}
//!          ◀─stdout── {"objective": "...", "intent": "host_discovery", ...}
//! ```
//!
//! The program may wrap the JSON in prose or a fenced block; extraction is
//! lenient (see [`parse_decision`]). A non-zero exit, an unreadable answer or
//! a shape mismatch is an [`OracleFailure`]. Timeouts and retries belong to
//! the caller; the child is killed if the call future is dropped.

use super::instructions::instructions;
use async_trait::async_trait;
use gauntlet_application::OraclePort;
use gauntlet_domain::core::shell;
use gauntlet_domain::core::string::truncate;
use gauntlet_domain::oracle::{
    Decision, ObserveDecision, OracleContext, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision, parse_decision,
};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr quoted in a backend failure.
const STDERR_EXCERPT: usize = 512;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Oracle command line is empty")]
pub struct EmptyOracleCommand;

pub struct ProcessOracle {
    program: String,
    args: Vec<String>,
    name: String,
}

impl ProcessOracle {
    /// Parse a command line such as `python3 oracle.py --model local`.
    pub fn new(command_line: &str) -> Result<Self, EmptyOracleCommand> {
        let mut words = shell::split(command_line).into_iter();
        let program = words.next().ok_or(EmptyOracleCommand)?;
        let name = format!(
            "process:{}",
            program.rsplit('/').next().unwrap_or(program.as_str())
        );
        Ok(Self {
            program,
            args: words.collect(),
            name,
        })
    }

    async fn call<D: Decision + Send>(&self, context: &OracleContext) -> Result<D, OracleFailure> {
        let call = context.call;
        let request = serde_json::json!({
            "call": call.as_str(),
            "instructions": instructions(call),
            "context": context,
        });
        let mut payload = serde_json::to_vec(&request)
            .map_err(|e| OracleFailure::backend(call, format!("encode request: {}", e)))?;
        payload.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleFailure::backend(call, format!("spawn {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleFailure::backend(call, "stdin not captured"))?;
        // Write concurrently with reading so a chatty program cannot deadlock us.
        let writer = tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OracleFailure::backend(call, format!("wait: {}", e)))?;
        if let Ok(Err(e)) = writer.await {
            debug!(call = %call, error = %e, "Oracle closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleFailure::backend(
                call,
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    truncate(stderr.trim(), STDERR_EXCERPT)
                ),
            ));
        }

        let response = String::from_utf8_lossy(&output.stdout);
        debug!(call = %call, bytes = response.len(), "Oracle responded");
        parse_decision(&response)
    }
}

#[async_trait]
impl OraclePort for ProcessOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn think(&self, context: &OracleContext) -> Result<ThinkDecision, OracleFailure> {
        self.call(context).await
    }

    async fn plan(&self, context: &OracleContext) -> Result<PlanDecision, OracleFailure> {
        self.call(context).await
    }

    async fn propose(&self, context: &OracleContext) -> Result<ProposeDecision, OracleFailure> {
        self.call(context).await
    }

    async fn observe(&self, context: &OracleContext) -> Result<ObserveDecision, OracleFailure> {
        self.call(context).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use gauntlet_domain::oracle::OracleCall;
    use gauntlet_domain::session::Session;

    fn script(body: &str) -> (tempfile::TempDir, ProcessOracle) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.sh");
        std::fs::write(&path, body).unwrap();
        let oracle = ProcessOracle::new(&format!("sh {}", path.display())).unwrap();
        (dir, oracle)
    }

    fn session() -> Session {
        Session::new("enumerate 192.168.1.0/24")
    }

    #[test]
    fn test_empty_command_line_rejected() {
        assert!(ProcessOracle::new("   ").is_err());
        assert_eq!(ProcessOracle::new("/usr/bin/llm -m x").unwrap().name(), "process:llm");
    }

    #[tokio::test]
    async fn test_plan_answer_in_fenced_block() {
        let (_dir, oracle) = script(
            "cat > /dev/null\n\
             printf 'Sure.\\n```json\\n{\"objective\": \"find hosts\", \"intent\": \"host_discovery\"}\\n```\\n'\n",
        );
        let decision = oracle
            .plan(&OracleContext::plan(&session(), Vec::new()))
            .await
            .unwrap();
        assert_eq!(decision.intent, "host_discovery");
    }

    #[tokio::test]
    async fn test_request_carries_call_and_context() {
        // Echo the request's call name back as the reasoning.
        let (_dir, oracle) = script(
            "call=$(grep -o '\"call\":\"[a-z]*\"' | head -n 1 | cut -d'\"' -f4)\n\
             printf '{\"goal_satisfied\": false, \"reasoning\": \"%s\"}' \"$call\"\n",
        );
        let decision = oracle.think(&OracleContext::think(&session())).await.unwrap();
        assert_eq!(decision.reasoning, "think");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_backend_failure() {
        let (_dir, oracle) = script("cat > /dev/null\necho 'model offline' >&2\nexit 2\n");
        let err = oracle.think(&OracleContext::think(&session())).await.unwrap_err();
        match err {
            OracleFailure::Backend { call, message } => {
                assert_eq!(call, OracleCall::Think);
                assert!(message.contains("model offline"));
            }
            other => panic!("expected backend failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prose_answer_is_malformed() {
        let (_dir, oracle) = script("cat > /dev/null\necho 'I cannot help with that.'\n");
        let err = oracle.think(&OracleContext::think(&session())).await.unwrap_err();
        assert!(matches!(err, OracleFailure::Malformed { .. }));
    }
}
