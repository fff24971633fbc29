//! Execution tracker
//!
//! Decouples deciding what to run from running it. Records move through
//! `PENDING → RUNNING → COMPLETE` and from the pending partition of the
//! [`ExecutionStore`] to the complete one; a record is never in both.
//!
//! Runs of one session are serialized: `submit` refuses new work once the
//! session holds `max_pending` records in the pending partition (PENDING or
//! RUNNING), and `run` refuses a record that is already RUNNING.
//!
//! A RUNNING record carries the pid of the process running it. Recovery
//! only closes out records whose runner is gone, so `gauntlet run` in one
//! terminal and `gauntlet resume` in another share the store safely.

use crate::config::ExecutionParams;
use crate::ports::command_backend::{
    BackendError, CommandBackend, CurrentProcessLiveness, ProcessLiveness, ProcessOutput,
};
use crate::ports::storage::{ExecutionStore, StoreError};
use gauntlet_domain::command::{
    CommandId, CommandOutcome, CommandRecord, CommandStatus, CompletedCommand, ExecutionRecord,
    FailureReason,
};
use gauntlet_domain::core::error::DomainError;
use gauntlet_domain::core::string::cap_output;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the tracker. None of them are retried.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Command id already submitted: {0}")]
    DuplicateId(CommandId),

    #[error("No execution record for {0}")]
    NotFound(CommandId),

    #[error("Command {id} is not complete (status: {status})")]
    NotReady { id: CommandId, status: CommandStatus },

    #[error("Session {session} already has {limit} command(s) awaiting execution")]
    TooManyPending { session: String, limit: usize },

    #[error("Command {0} is already running")]
    AlreadyRunning(CommandId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Execution worker failed: {0}")]
    Backend(String),
}

pub struct ExecutionTracker {
    store: Arc<dyn ExecutionStore>,
    backend: Arc<dyn CommandBackend>,
    params: ExecutionParams,
    liveness: Arc<dyn ProcessLiveness>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExecutionTracker {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        backend: Arc<dyn CommandBackend>,
        params: ExecutionParams,
    ) -> Self {
        Self {
            store,
            backend,
            params,
            liveness: Arc::new(CurrentProcessLiveness),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Set how the owners of RUNNING records are checked during recovery.
    pub fn with_liveness(mut self, liveness: Arc<dyn ProcessLiveness>) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Persist a PENDING record for `session_id`.
    pub async fn submit(
        &self,
        session_id: &str,
        command: CommandRecord,
    ) -> Result<CommandId, TrackerError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        if self.store.get(session_id, &command.id)?.is_some() {
            return Err(TrackerError::DuplicateId(command.id));
        }
        if command.status() != CommandStatus::Pending {
            return Err(DomainError::InvalidTransition {
                id: command.id.to_string(),
                from: command.status().as_str(),
                to: "pending",
            }
            .into());
        }

        let waiting = self.store.list_pending(session_id)?.len();
        if waiting >= self.params.max_pending {
            return Err(TrackerError::TooManyPending {
                session: session_id.to_string(),
                limit: self.params.max_pending,
            });
        }

        let record = ExecutionRecord::new(session_id, command);
        self.store.insert_pending(&record)?;
        info!(
            session_id,
            command_id = %record.id(),
            command = %record.command.rendered_command,
            "Command submitted"
        );
        Ok(record.command.id)
    }

    /// Execute a PENDING command to completion.
    ///
    /// A command that is already COMPLETE returns its stored result without
    /// running again. Timeouts and backend failures end as COMPLETE records
    /// with `success = false`, so a caller never sees a record stuck in
    /// RUNNING because of them.
    pub async fn run(
        &self,
        session_id: &str,
        id: &CommandId,
    ) -> Result<CompletedCommand, TrackerError> {
        let mut record = {
            let lock = self.session_lock(session_id);
            let _guard = lock.lock().await;

            let mut record = self
                .store
                .get(session_id, id)?
                .ok_or_else(|| TrackerError::NotFound(id.clone()))?;
            match record.status() {
                CommandStatus::Complete => return completed_of(&record),
                CommandStatus::Running => return Err(TrackerError::AlreadyRunning(id.clone())),
                CommandStatus::Pending => {}
            }
            record.command.mark_running()?;
            record.runner_pid = Some(std::process::id());
            self.store.update_pending(&record)?;
            record
        };

        info!(
            session_id,
            command_id = %id,
            timeout_secs = self.params.command_timeout.as_secs(),
            "Running command"
        );
        let started = Instant::now();
        let result = self
            .backend
            .execute(&record.command.rendered_command, self.params.command_timeout)
            .await;
        let outcome = outcome_of(result, started.elapsed(), self.params.output_cap_bytes);

        match &outcome.failure {
            None => info!(session_id, command_id = %id, elapsed_ms = outcome.elapsed_ms, "Command complete"),
            Some(reason) => warn!(session_id, command_id = %id, reason = %reason, "Command failed"),
        }

        record.command.mark_complete(outcome)?;
        match self.store.complete(&record) {
            Ok(()) => completed_of(&record),
            Err(StoreError::AlreadyComplete(_)) => {
                // Another process closed the record out first; its result stands.
                warn!(session_id, command_id = %id, "Record already complete, discarding this run's result");
                self.result(session_id, id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// [`run`](Self::run) on a separate task, so the caller's task only
    /// waits on the join handle.
    pub async fn spawn_run(
        self: &Arc<Self>,
        session_id: &str,
        id: &CommandId,
    ) -> Result<CompletedCommand, TrackerError> {
        let tracker = Arc::clone(self);
        let session_id = session_id.to_string();
        let id = id.clone();
        tokio::spawn(async move { tracker.run(&session_id, &id).await })
            .await
            .map_err(|e| TrackerError::Backend(e.to_string()))?
    }

    pub fn status(&self, session_id: &str, id: &CommandId) -> Result<CommandStatus, TrackerError> {
        Ok(self.record(session_id, id)?.status())
    }

    pub fn result(
        &self,
        session_id: &str,
        id: &CommandId,
    ) -> Result<CompletedCommand, TrackerError> {
        completed_of(&self.record(session_id, id)?)
    }

    pub fn record(&self, session_id: &str, id: &CommandId) -> Result<ExecutionRecord, TrackerError> {
        self.store
            .get(session_id, id)?
            .ok_or_else(|| TrackerError::NotFound(id.clone()))
    }

    /// Close out records left RUNNING by a dead process.
    ///
    /// They become COMPLETE with reason `interrupted` and are never re-run.
    /// Records whose runner is still alive and PENDING records are left
    /// alone. A record without a runner pid counts as orphaned.
    pub fn recover(&self, session_id: &str) -> Result<Vec<CommandId>, TrackerError> {
        let mut interrupted = Vec::new();
        for mut record in self.store.list_pending(session_id)? {
            if record.status() != CommandStatus::Running {
                continue;
            }
            if let Some(pid) = record.runner_pid.filter(|pid| self.liveness.is_alive(*pid)) {
                debug!(session_id, command_id = %record.id(), pid, "Command still running elsewhere");
                continue;
            }
            record.command.mark_interrupted()?;
            match self.store.complete(&record) {
                Ok(()) => {}
                Err(StoreError::AlreadyComplete(_)) => continue,
                Err(e) => return Err(e.into()),
            }
            warn!(session_id, command_id = %record.id(), "Interrupted command closed out");
            interrupted.push(record.command.id);
        }
        Ok(interrupted)
    }

    /// [`recover`](Self::recover) for every session with records.
    pub fn recover_all(&self) -> Result<usize, TrackerError> {
        let mut total = 0;
        for session_id in self.store.sessions()? {
            total += self.recover(&session_id)?.len();
        }
        if total > 0 {
            info!(count = total, "Recovered interrupted commands");
        }
        Ok(total)
    }

    /// Records awaiting execution, oldest submission first.
    pub fn pending(&self, session_id: &str) -> Result<Vec<ExecutionRecord>, TrackerError> {
        let mut records = self.store.list_pending(session_id)?;
        sort_by_submission(&mut records);
        Ok(records)
    }

    /// Every record of the session, oldest submission first.
    pub fn executions(&self, session_id: &str) -> Result<Vec<ExecutionRecord>, TrackerError> {
        let mut records = self.store.list_pending(session_id)?;
        records.extend(self.store.list_complete(session_id)?);
        sort_by_submission(&mut records);
        Ok(records)
    }

    /// Remove every execution record of the session.
    pub fn cleanup(&self, session_id: &str) -> Result<usize, TrackerError> {
        let removed = self.store.remove_session(session_id)?;
        debug!(session_id, removed, "Execution records removed");
        Ok(removed)
    }
}

fn sort_by_submission(records: &mut [ExecutionRecord]) {
    records.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn completed_of(record: &ExecutionRecord) -> Result<CompletedCommand, TrackerError> {
    record
        .command
        .completed()
        .ok_or_else(|| TrackerError::NotReady {
            id: record.id().clone(),
            status: record.status(),
        })
}

fn outcome_of(
    result: Result<ProcessOutput, BackendError>,
    elapsed: Duration,
    cap: usize,
) -> CommandOutcome {
    match result {
        Ok(output) => {
            let elapsed_ms = output.elapsed.as_millis() as u64;
            let stdout = cap_output(output.stdout, cap);
            let stderr = cap_output(output.stderr, cap);
            match output.exit_code {
                Some(code) => CommandOutcome::from_exit(stdout, stderr, code, elapsed_ms),
                None => CommandOutcome::failed(
                    FailureReason::Backend {
                        message: "terminated by signal".to_string(),
                    },
                    stdout,
                    stderr,
                    elapsed_ms,
                ),
            }
        }
        Err(BackendError::Timeout {
            after,
            stdout,
            stderr,
        }) => CommandOutcome::failed(
            FailureReason::Timeout {
                after_secs: after.as_secs(),
            },
            cap_output(stdout, cap),
            cap_output(stderr, cap),
            after.as_millis() as u64,
        ),
        Err(error) => CommandOutcome::failed(
            FailureReason::Backend {
                message: error.to_string(),
            },
            String::new(),
            String::new(),
            elapsed.as_millis() as u64,
        ),
    }
}
