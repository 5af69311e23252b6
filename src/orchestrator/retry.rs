//! Bounded retry around a fallible async action.
//!
//! Fixed delay between attempts, no backoff growth and no jitter. Whether an
//! error is worth another attempt is decided by the error itself through
//! [`Retryable`]; the last error is returned unchanged once attempts run out.

use std::future::Future;
use std::time::Duration;

/// Default number of attempts per stage.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Classifies an error as transient (retry) or permanent (stop now).
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for anyhow::Error {
    fn is_retryable(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `action` until it succeeds, returns a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn execute<T, E, F, Fut>(&self, mut action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    tracing::warn!(attempt, error = %err, "Non-retryable failure, giving up");
                    return Err(err);
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(attempt, max_attempts, error = %err, "Attempts exhausted");
                    return Err(err);
                }
                Err(err) => {
                    tracing::info!(
                        attempt,
                        max_attempts,
                        error = %err,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[derive(Debug, PartialEq)]
    struct TestError {
        attempt: u32,
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure on attempt {}", self.attempt)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::new(max_attempts, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_calls_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<&str, TestError> = fast(3)
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("done")
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast(3)
            .execute(|| async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(TestError {
                        attempt,
                        retryable: true,
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error_unchanged() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), TestError> = fast(4)
            .execute(|| async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TestError {
                    attempt,
                    retryable: true,
                })
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            TestError {
                attempt: 4,
                retryable: true
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), TestError> = fast(5)
            .execute(|| async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TestError {
                    attempt,
                    retryable: false,
                })
            })
            .await;
        assert_eq!(result.unwrap_err().attempt, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delay_between_attempts_but_not_after_last() {
        let executor = RetryExecutor::new(RetryPolicy::new(3, Duration::from_millis(30)));
        let start = Instant::now();
        let result: Result<(), anyhow::Error> = executor
            .execute(|| async { Err(anyhow::anyhow!("always")) })
            .await;
        let elapsed = start.elapsed();
        assert!(result.is_err());
        assert!(elapsed >= Duration::from_millis(60), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1000), "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_policy_clamps_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
