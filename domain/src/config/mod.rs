//! Configuration value objects for the domain layer
//!
//! These are domain concepts related to configuration that are
//! used across multiple layers.

mod approval_mode;
pub mod validation;

pub use approval_mode::ApprovalMode;
pub use validation::{ConfigIssue, ConfigIssueCode, IssueSeverity};
