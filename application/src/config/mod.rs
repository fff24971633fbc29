//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`ExecutionParams`]: agent loop and tracker limits (re-plans, cycles, timeouts)
//! - [`RetryPolicy`]: oracle call timeout, retry budget and worker pool size

pub mod execution_params;
pub mod retry_policy;

pub use execution_params::ExecutionParams;
pub use retry_policy::RetryPolicy;
