//! Oracle port
//!
//! Defines the interface to the reasoning backend that makes the four loop
//! decisions.

use async_trait::async_trait;
use gauntlet_domain::oracle::{
    ObserveDecision, OracleContext, OracleFailure, PlanDecision, ProposeDecision, ThinkDecision,
};

/// Reasoning backend.
///
/// Implementations (adapters) live in the infrastructure layer. Each call
/// returns either a validated decision or an [`OracleFailure`]; retries,
/// timeouts and fallbacks are applied by
/// [`OracleClient`](crate::use_cases::oracle_client::OracleClient), not here.
#[async_trait]
pub trait OraclePort: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn think(&self, context: &OracleContext) -> Result<ThinkDecision, OracleFailure>;

    async fn plan(&self, context: &OracleContext) -> Result<PlanDecision, OracleFailure>;

    async fn propose(&self, context: &OracleContext) -> Result<ProposeDecision, OracleFailure>;

    async fn observe(&self, context: &OracleContext) -> Result<ObserveDecision, OracleFailure>;
}
