//! Session domain.
//!
//! - [`entities::Session`]: the root aggregate of one engagement
//! - [`phase`]: red-team phases and agent loop states
//! - [`view`]: read-only projections for reports and resume

pub mod entities;
pub mod phase;
pub mod view;

pub use entities::{
    FailureKind, FailureRecord, PhaseTransition, Reconciliation, Session, SessionId,
};
pub use phase::{LoopState, RedTeamPhase};
pub use view::{LastCommand, ResumeContext, SessionView};
