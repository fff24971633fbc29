//! Safety Validator.
//!
//! - [`patterns`]: the destructive-signature denylist
//! - [`scope`]: target extraction and allowed-network membership
//! - [`validator`]: the layered verdict and approval advisories

pub mod patterns;
pub mod scope;
pub mod validator;

pub use patterns::{DenyPattern, PatternCategory};
pub use scope::{Scope, ScopeEntry, Target, extract_targets};
pub use validator::{RejectionReason, SafetyPolicy, Verdict, approval_advisories, validate};
