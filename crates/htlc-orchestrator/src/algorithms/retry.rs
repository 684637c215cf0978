//! # Retry Policy
//!
//! Bounded exponential backoff for transient chain errors. Only errors
//! classified `Transient` are retried; anything else returns immediately.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::domain::SwapError;

/// Exponential backoff parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: u32,
    /// Delay ceiling.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 2_000,
            multiplier: 2,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 100,
            multiplier: 2,
            max_delay_ms: 1_000,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.base_delay_ms;
        for _ in 1..attempt {
            delay = delay.saturating_mul(self.multiplier as u64);
            if delay >= self.max_delay_ms {
                break;
            }
        }
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Run `op` until it succeeds, fails non-transiently, or exhausts the policy.
///
/// `on_retry` observes each absorbed transient error.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut on_retry: impl FnMut(u32, &SwapError),
    mut op: F,
) -> Result<T, SwapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SwapError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= max_attempts {
                    return Err(SwapError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                on_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
