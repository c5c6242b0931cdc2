//! Bounded retry for transient connectivity failures.
//!
//! Both the agent's delivery client and the relational store retry an operation
//! only when it failed because the peer refused the connection. Everything else
//! is returned to the caller on the first attempt.

use std::error::Error as StdError;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Classifies errors for [`RetryPolicy`].
pub trait RetryableError {
    /// Returns true if the failed operation may succeed when attempted again.
    fn is_retryable(&self) -> bool;
}

/// Returns true if `err` or any error in its source chain is an I/O error of
/// kind [`io::ErrorKind::ConnectionRefused`].
#[must_use]
pub fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Retry policy: one initial attempt followed by one retry per back-off delay.
///
/// # Example
///
/// ```
/// use shared::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.total_backoff(), Duration::from_secs(9));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a policy sleeping for each of `delays` in turn between attempts.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Creates a policy with `retries` linearly increasing delays:
    /// `initial`, `initial + step`, `initial + 2 * step`, ...
    #[must_use]
    pub fn linear(retries: u32, initial: Duration, step: Duration) -> Self {
        let delays = (0..retries).map(|i| initial + step * i).collect();
        Self { delays }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total number of attempts, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Sum of all back-off delays.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        self.delays.iter().sum()
    }

    /// Runs `operation`, retrying while it fails with a retryable error and
    /// delays remain.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable error once
    /// the delays are exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let mut delays = self.delays.iter();
        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    let Some(delay) = delays.next() else {
                        tracing::warn!(attempt, error = %err, "Giving up after retries");
                        return Err(err);
                    };
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three retries after 1s, 3s and 5s.
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(1), Duration::from_secs(2))
    }
}
