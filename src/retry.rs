//! Fixed-interval retry policy.
//!
//! Bucket creation races with concurrent first writers of the same bucket;
//! the backend reports those races as conflicts that clear up on their own.
//! [`RetryPolicy::run`] re-issues an operation while a caller-supplied
//! predicate says the failure is transient, up to a bounded count.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry with a fixed sleep between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Sleep between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.  The last error is returned unchanged.
    pub async fn run<T, E, F, Fut, P>(&self, operation: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && retryable(&err) => {
                    attempt += 1;
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempt,
                        self.max_retries + 1,
                        self.interval,
                        err
                    );
                    metrics::counter!(crate::metrics::CONFLICT_RETRIES_TOTAL).increment(1);
                    tokio::time::sleep(self.interval).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Five retries two seconds apart.
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(2))
    }
}
