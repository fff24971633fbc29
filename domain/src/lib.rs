//! Domain layer for gauntlet
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Session
//!
//! A [`Session`] is one engagement toward a free-text goal. It walks the
//! red-team phases (recon → enumeration → vulnerability → exploitation),
//! owns the accumulated [`FactStore`], and keeps an append-only history of
//! commands and failures.
//!
//! ## Safety
//!
//! Every rendered command passes [`safety::validate`] before a human sees
//! it: a destructive-pattern denylist, per-tool flag allowlists, and
//! allowed-network scoping. The verdict is deterministic.
//!
//! ## Facts
//!
//! OBSERVE output is folded in with [`facts::merge`], an order-independent
//! and idempotent join keyed by normalized identities.

pub mod command;
pub mod config;
pub mod core;
pub mod facts;
pub mod oracle;
pub mod safety;
pub mod session;
pub mod tool;

// Re-export commonly used types
pub use command::{
    CommandId, CommandOutcome, CommandRecord, CommandState, CommandStatus, CompletedCommand,
    ExecutionRecord, FailureReason,
};
pub use config::{ApprovalMode, ConfigIssue, ConfigIssueCode, IssueSeverity};
pub use core::error::DomainError;
pub use facts::{FactStore, FactSummary, ObservedFacts};
pub use oracle::{
    ObserveDecision, OracleCall, OracleContext, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision,
};
pub use safety::{RejectionReason, SafetyPolicy, Scope, Verdict};
pub use session::{
    FailureKind, FailureRecord, LoopState, PhaseTransition, RedTeamPhase, ResumeContext, Session,
    SessionId, SessionView,
};
pub use tool::{IntentSummary, IntentTemplate, ResolvedIntent, ToolCatalog, ToolDescriptor};
