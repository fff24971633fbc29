//! Agent presentation components
//!
//! - Progress reporting for the agent loop
//! - Interactive approval gate for proposed commands

pub mod approval;
pub mod progress;

pub use approval::InteractiveApproval;
pub use progress::{AgentProgressReporter, SimpleAgentProgress};
