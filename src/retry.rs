//! Bounded retry with an injectable backoff policy.
//!
//! Retry behavior is data, not scattered annotations: callers describe the
//! attempt ceiling and backoff shape in a [`RetryPolicy`] and decide which
//! error classes are worth retrying via a predicate.
//!
//! # Backoff Strategy
//!
//! `RandomExponential` draws each delay uniformly from a window that doubles
//! per attempt and is capped:
//! ```text
//! delay = uniform(base, min(base * 2^(attempt-1), cap))
//! ```

use std::time::Duration;

use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Retry immediately. Used where an outer throttle already paces attempts.
    None,
    /// Randomized exponential delay between `base` and `cap`.
    RandomExponential { base: Duration, cap: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// The policy applied to rate-limited model calls: 6 attempts with
    /// randomized exponential backoff between 1 and 60 seconds.
    pub fn rate_limit() -> Self {
        Self {
            max_attempts: 6,
            backoff: Backoff::RandomExponential {
                base: Duration::from_secs(1),
                cap: Duration::from_secs(60),
            },
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::RandomExponential { base, cap } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let mut window = base.saturating_mul(1u32 << exponent);
                if window > cap {
                    window = cap;
                }
                let base_ms = base.as_millis() as u64;
                let window_ms = (window.as_millis() as u64).max(base_ms);
                Duration::from_millis(rng().random_range(base_ms..=window_ms))
            }
        }
    }
}

/// Run `op` until it succeeds, the policy's attempt ceiling is reached, or it
/// fails with an error `is_retryable` rejects. The final error is returned
/// unchanged, never swallowed.
pub async fn retry<T, F, Fut, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max = policy.max_attempts,
                    ?delay,
                    error = %e,
                    "attempt failed; backing off"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
