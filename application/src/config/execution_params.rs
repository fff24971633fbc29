//! Agent loop and tracker control parameters.
//!
//! [`ExecutionParams`] groups the static parameters that control the agent
//! loop in [`RunAgentUseCase`](crate::use_cases::run_agent::RunAgentUseCase)
//! and the [`ExecutionTracker`](crate::use_cases::execution_tracker::ExecutionTracker).
//! These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Captured stdout/stderr cap per stream.
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 1024 * 1024;

/// Agent loop and tracker control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Re-plans allowed per cycle after safety rejection, invalid proposal or
    /// denied approval.
    pub max_safety_replans: u32,
    /// Cycles one invocation may drive before returning.
    pub max_cycles: u32,
    /// Wall-clock limit for one external command.
    pub command_timeout: Duration,
    /// Submitted-but-not-run commands allowed per session.
    pub max_pending: usize,
    /// Delay between tracker polls while a command runs elsewhere.
    pub poll_interval: Duration,
    /// Cap on each captured output stream.
    pub output_cap_bytes: usize,
    /// Output bytes per stream handed to OBSERVE.
    pub observe_output_bytes: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_safety_replans: 3,
            max_cycles: 25,
            command_timeout: Duration::from_secs(600),
            max_pending: 1,
            poll_interval: Duration::from_secs(2),
            output_cap_bytes: DEFAULT_OUTPUT_CAP_BYTES,
            observe_output_bytes: 16 * 1024,
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_max_safety_replans(mut self, max: u32) -> Self {
        self.max_safety_replans = max;
        self
    }

    pub fn with_max_cycles(mut self, max: u32) -> Self {
        self.max_cycles = max;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_output_cap(mut self, bytes: usize) -> Self {
        self.output_cap_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = ExecutionParams::default();
        assert_eq!(params.max_safety_replans, 3);
        assert_eq!(params.max_pending, 1);
        assert_eq!(params.output_cap_bytes, 1024 * 1024);
        assert_eq!(params.command_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_builder() {
        let params = ExecutionParams::default()
            .with_max_cycles(3)
            .with_command_timeout(Duration::from_millis(50))
            .with_max_pending(2);

        assert_eq!(params.max_cycles, 3);
        assert_eq!(params.command_timeout, Duration::from_millis(50));
        assert_eq!(params.max_pending, 2);
    }
}
