//! Bounded retry for retryable store conflicts.
//!
//! ```text
//! attempt 1 ── Conflict ──► wait 1 × backoff
//! attempt 2 ── Conflict ──► wait 2 × backoff
//! ...
//! attempt max_conflict_retries + 1 ── Conflict ──► surfaced to the caller
//! ```
//!
//! Only errors for which `DbError::is_retryable` holds are retried; a
//! validation error or a missing concert fails on the first attempt.

use std::future::Future;
use std::time::Duration;

use encore_db::{DbError, DbResult};
use tracing::warn;

/// How often and how patiently a conflicted operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_conflict_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(50))
    }
}

impl RetryPolicy {
    pub fn new(max_conflict_retries: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_conflict_retries,
            backoff,
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Retries after the first attempt; the total is this plus one.
    pub fn max_conflict_retries(&self) -> u32 {
        self.max_conflict_retries
    }

    /// Delay before the next attempt, or `None` when `err` after `attempt`
    /// (1-based) must be surfaced.
    pub fn backoff_for(&self, attempt: u32, err: &DbError) -> Option<Duration> {
        if !err.is_retryable() || attempt > self.max_conflict_retries {
            return None;
        }
        Some(self.backoff.saturating_mul(attempt))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable
    /// error, or runs out of retries.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut f: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.backoff_for(attempt, &err) {
                    Some(delay) => {
                        warn!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying after conflict"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        if err.is_retryable() {
                            warn!(
                                operation,
                                attempt,
                                max_conflict_retries = self.max_conflict_retries,
                                error = %err,
                                "Retries exhausted"
                            );
                        }
                        return Err(err);
                    }
                },
            }
        }
    }
}
