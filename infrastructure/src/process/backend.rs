//! Runs rendered commands through `sh -c` with a wall-clock limit.
//!
//! stdout and stderr are drained by separate tasks into shared buffers, so
//! whatever a command printed before it was killed survives a timeout. On
//! unix the command gets its own process group and a timeout kills the whole
//! group, which takes down children the shell forked.

use async_trait::async_trait;
use gauntlet_application::{BackendError, CommandBackend, ProcessOutput};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bytes kept per stream; the rest is read and discarded.
pub const DEFAULT_CAPTURE_LIMIT: usize = 4 * 1024 * 1024;

/// How long readers may keep draining after the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

pub struct ProcessBackend {
    shell: String,
    working_dir: Option<PathBuf>,
    capture_limit: usize,
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: None,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_capture_limit(mut self, bytes: usize) -> Self {
        self.capture_limit = bytes;
        self
    }

    fn build(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        // Linux: request kernel to send SIGTERM to the command when we die.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }
        cmd
    }
}

#[async_trait]
impl CommandBackend for ProcessBackend {
    async fn execute(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ProcessOutput, BackendError> {
        let start = Instant::now();
        let mut child = self
            .build(command)
            .spawn()
            .map_err(|e| BackendError::Spawn(e.to_string()))?;
        debug!(pid = child.id(), command, "Command spawned");

        let stdout_buf = SharedBuffer::default();
        let stderr_buf = SharedBuffer::default();
        let stdout_task = child
            .stdout
            .take()
            .map(|s| tokio::spawn(drain(s, stdout_buf.clone(), self.capture_limit)));
        let stderr_task = child
            .stderr
            .take()
            .map(|s| tokio::spawn(drain(s, stderr_buf.clone(), self.capture_limit)));

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                finish(stdout_task).await;
                finish(stderr_task).await;
                Ok(ProcessOutput {
                    stdout: take(&stdout_buf),
                    stderr: take(&stderr_buf),
                    exit_code: status.code(),
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(e)) => {
                kill(&mut child).await;
                Err(BackendError::Io(e.to_string()))
            }
            Err(_) => {
                warn!(command, timeout_secs = timeout.as_secs(), "Command timed out, killing");
                kill(&mut child).await;
                finish(stdout_task).await;
                finish(stderr_task).await;
                Err(BackendError::Timeout {
                    after: timeout,
                    stdout: take(&stdout_buf),
                    stderr: take(&stderr_buf),
                })
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, buffer: SharedBuffer, limit: usize) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                let room = limit.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!(error = %e, "Output stream closed with error");
                break;
            }
        }
    }
}

/// Let a reader finish; a grandchild holding the pipe open must not hang us.
async fn finish(task: Option<JoinHandle<()>>) {
    let Some(mut task) = task else {
        return;
    };
    if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
        task.abort();
    }
}

async fn kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Kill after group kill");
    }
}

/// The command leads its own group; take every member down.
#[cfg(unix)]
fn kill_group(pid: u32) {
    unsafe {
        libc::killpg(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

fn take(buffer: &SharedBuffer) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(|e| e.into_inner()));
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let output = ProcessBackend::new()
            .execute("echo hello; echo oops >&2; exit 3", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let err = ProcessBackend::new()
            .execute("echo started; sleep 5; echo never", Duration::from_millis(300))
            .await
            .unwrap_err();

        match err {
            BackendError::Timeout { after, stdout, .. } => {
                assert_eq!(after, Duration::from_millis(300));
                assert_eq!(stdout, "started\n");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capture_limit_truncates_silently() {
        let output = ProcessBackend::new()
            .with_capture_limit(4)
            .execute("printf 'abcdefgh'", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(output.stdout, "abcd");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_shell_is_a_spawn_error() {
        let err = ProcessBackend::new()
            .with_shell("/nonexistent/shell")
            .execute("true", Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessBackend::new()
            .with_working_dir(dir.path())
            .execute("pwd", Duration::from_secs(10))
            .await
            .unwrap();

        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
