//! Application layer for gauntlet
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{ExecutionParams, RetryPolicy};
pub use ports::{
    agent_progress::{AgentProgressNotifier, NoAgentProgress},
    approval::{
        ApprovalDecision, ApprovalError, ApprovalPort, ApprovalRequest, AutoApprove, AutoReject,
    },
    command_backend::{
        BackendError, CommandBackend, CurrentProcessLiveness, ProcessLiveness, ProcessOutput,
    },
    event_log::{NoSessionEventLogger, SessionEvent, SessionEventLogger},
    oracle::OraclePort,
    storage::{ExecutionStore, SnapshotStore, StoreError},
    tool_catalog::ToolCatalogPort,
};
pub use use_cases::execution_tracker::{ExecutionTracker, TrackerError};
pub use use_cases::oracle_client::{OracleAnswer, OracleClient};
pub use use_cases::run_agent::{
    RunAgentError, RunAgentOutput, RunAgentUseCase, RunMode, StopReason,
};
pub use use_cases::session_manager::{ActiveSession, ResumedSession, SessionError, SessionManager};
pub use use_cases::state_recovery::{
    DEFAULT_BACKUP_RETENTION, LoadedSession, RecoveryError, StateRecovery,
};
