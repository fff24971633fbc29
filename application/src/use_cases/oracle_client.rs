//! Oracle client: timeout, retry with backoff, and fallback.
//!
//! All four loop call sites go through [`with_retry`], parameterized by the
//! [`RetryPolicy`] and a fallback supplier. An oracle that never answers
//! costs at most `max_attempts` timeouts plus backoff, then the loop proceeds
//! on the fallback decision.

use crate::config::RetryPolicy;
use crate::ports::agent_progress::AgentProgressNotifier;
use crate::ports::oracle::OraclePort;
use gauntlet_domain::oracle::{
    ObserveDecision, OracleCall, OracleContext, OracleFailure, PlanDecision, ProposeDecision,
    ThinkDecision,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A decision plus the failure that forced a fallback, if any.
#[derive(Debug, Clone)]
pub struct OracleAnswer<T> {
    pub value: T,
    /// Set when every attempt failed and `value` came from the fallback.
    pub degraded: Option<OracleFailure>,
    pub attempts: u32,
}

impl<T> OracleAnswer<T> {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Run `op` under the policy's timeout and retry budget.
///
/// Each attempt holds a permit from `pool` only while it is in flight, so
/// backoff sleeps never occupy a worker slot.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    pool: &Semaphore,
    call: OracleCall,
    mut op: F,
    fallback: impl FnOnce() -> T,
    progress: &dyn AgentProgressNotifier,
) -> OracleAnswer<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let result = match pool.acquire().await {
            Ok(_permit) => match tokio::time::timeout(policy.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(OracleFailure::Timeout {
                    call,
                    after_ms: policy.call_timeout.as_millis() as u64,
                }),
            },
            Err(_) => Err(OracleFailure::backend(call, "oracle worker pool closed")),
        };

        match result {
            Ok(value) => {
                debug!(call = %call, attempt, "oracle call succeeded");
                return OracleAnswer {
                    value,
                    degraded: None,
                    attempts: attempt,
                };
            }
            Err(error) => {
                warn!(call = %call, attempt, max_attempts, error = %error, "oracle call failed");
                if attempt < max_attempts {
                    progress.on_oracle_retry(call, attempt, max_attempts, &error);
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
                last_error = Some(error);
            }
        }
    }

    let error = last_error.unwrap_or_else(|| OracleFailure::backend(call, "no attempt made"));
    warn!(call = %call, error = %error, "oracle retries exhausted, using fallback decision");
    progress.on_oracle_fallback(call, &error);
    OracleAnswer {
        value: fallback(),
        degraded: Some(error),
        attempts: max_attempts,
    }
}

/// Shared front for an [`OraclePort`].
///
/// One client (and so one worker pool) is shared by every session in the
/// process.
pub struct OracleClient {
    oracle: Arc<dyn OraclePort>,
    policy: RetryPolicy,
    pool: Arc<Semaphore>,
}

impl Clone for OracleClient {
    fn clone(&self) -> Self {
        Self {
            oracle: self.oracle.clone(),
            policy: self.policy.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn OraclePort>, policy: RetryPolicy) -> Self {
        let pool = Arc::new(Semaphore::new(policy.concurrency.max(1)));
        Self {
            oracle,
            policy,
            pool,
        }
    }

    pub fn name(&self) -> &str {
        self.oracle.name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// THINK; falls back to "not satisfied, stay in phase".
    pub async fn think(
        &self,
        context: &OracleContext,
        progress: &dyn AgentProgressNotifier,
    ) -> OracleAnswer<ThinkDecision> {
        with_retry(
            &self.policy,
            &self.pool,
            OracleCall::Think,
            move || self.oracle.think(context),
            ThinkDecision::fallback,
            progress,
        )
        .await
    }

    /// PLAN; falls back to the supplied default, which may be none.
    pub async fn plan(
        &self,
        context: &OracleContext,
        fallback: impl FnOnce() -> Option<PlanDecision>,
        progress: &dyn AgentProgressNotifier,
    ) -> OracleAnswer<Option<PlanDecision>> {
        with_retry(
            &self.policy,
            &self.pool,
            OracleCall::Plan,
            move || async move { self.oracle.plan(context).await.map(Some) },
            fallback,
            progress,
        )
        .await
    }

    /// PROPOSE; there is no safe default command, so the fallback is none.
    pub async fn propose(
        &self,
        context: &OracleContext,
        progress: &dyn AgentProgressNotifier,
    ) -> OracleAnswer<Option<ProposeDecision>> {
        with_retry(
            &self.policy,
            &self.pool,
            OracleCall::Propose,
            move || async move { self.oracle.propose(context).await.map(Some) },
            || None,
            progress,
        )
        .await
    }

    /// OBSERVE; falls back to extracting nothing.
    pub async fn observe(
        &self,
        context: &OracleContext,
        progress: &dyn AgentProgressNotifier,
    ) -> OracleAnswer<ObserveDecision> {
        with_retry(
            &self.policy,
            &self.pool,
            OracleCall::Observe,
            move || self.oracle.observe(context),
            ObserveDecision::empty,
            progress,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_progress::NoAgentProgress;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(1))
            .with_call_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let pool = Semaphore::new(1);
        let answer = with_retry(
            &fast_policy(),
            &pool,
            OracleCall::Think,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OracleFailure::malformed(OracleCall::Think, "garbage"))
                } else {
                    Ok(7)
                }
            },
            || 0,
            &NoAgentProgress,
        )
        .await;
        assert_eq!(answer.value, 7);
        assert_eq!(answer.attempts, 3);
        assert!(!answer.is_degraded());
    }

    #[tokio::test]
    async fn test_fallback_after_exhaustion() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let pool = Semaphore::new(1);
        let answer = with_retry(
            &fast_policy(),
            &pool,
            OracleCall::Plan,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(OracleFailure::backend(OracleCall::Plan, "down"))
            },
            || 42,
            &NoAgentProgress,
        )
        .await;
        assert_eq!(answer.value, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(matches!(answer.degraded, Some(OracleFailure::Backend { .. })));
    }

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let pool = Semaphore::new(1);
        let policy = fast_policy().with_max_attempts(1);
        let answer = with_retry(
            &policy,
            &pool,
            OracleCall::Observe,
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            },
            || 0,
            &NoAgentProgress,
        )
        .await;
        assert_eq!(answer.value, 0);
        assert!(matches!(
            answer.degraded,
            Some(OracleFailure::Timeout {
                call: OracleCall::Observe,
                ..
            })
        ));
    }
}
