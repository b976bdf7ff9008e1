//! Exponential backoff for idempotent Bitbucket requests.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::bitbucket::error::BitbucketError;

/// Attempts made by [`RetryPolicy::default`].
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Retry settings for GET requests.
///
/// Only [transient](BitbucketError::is_transient) failures are retried.
/// Mutating requests bypass the policy entirely.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bucketline::bitbucket::gateway::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
/// assert_eq!(policy.backoff_for(5), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy. A `max_attempts` of zero is treated as one.
    #[must_use]
    pub const fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            initial_backoff,
            max_backoff,
        }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Default backoff with a custom attempt count.
    #[must_use]
    pub const fn with_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF)
    }

    /// Total attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given failed attempt (1-based), doubling each time
    /// up to the cap.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `attempt_fn` until it succeeds, fails permanently, or the
    /// attempts are exhausted.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
    ) -> Result<T, BitbucketError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BitbucketError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        ?delay,
                        %error,
                        "transient Bitbucket failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_attempts(DEFAULT_RETRY_ATTEMPTS)
    }
}
