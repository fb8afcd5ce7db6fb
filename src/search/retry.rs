//! Bounded retry with exponential backoff for point searches.
//!
//! Only [`SearchError::Transient`] failures are retried; permanent
//! failures return immediately.

use crate::error::SearchError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times, and how patiently, to retry a failing search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// `operation` is called afresh on each attempt.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, operation: F) -> Result<T, SearchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "{}: {} (retry {}/{} in {:?})",
                    label, e, attempt, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
