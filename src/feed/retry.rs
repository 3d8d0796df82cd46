use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::news::CancelToken;

/// Classification an error gives the retry policy.
pub trait Retryable {
    /// Wait the fetch target asked for. `Some` always wins over backoff.
    fn retry_after(&self) -> Option<Duration>;

    /// Failure that may clear on its own (5xx, connect errors, timeouts).
    /// Only retried when the policy opts in.
    fn is_transient(&self) -> bool;

    /// Error reported when cancellation interrupts a retry delay.
    fn cancelled() -> Self;
}

/// Bounded retry with server-directed delays and capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Treated as at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Also retry [`Retryable::is_transient`] failures with backoff.
    pub retry_transient: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_transient: false,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given number of failed attempts (1-based):
    /// `base * 2^(failed - 1)`, capped at `max_delay`.
    pub fn backoff(&self, failed: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failed.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_for<E: Retryable>(&self, err: &E, failed: u32) -> Option<Duration> {
        if let Some(wait) = err.retry_after() {
            return Some(wait);
        }
        if self.retry_transient && err.is_transient() {
            return Some(self.backoff(failed));
        }
        None
    }

    /// Runs `op` until it succeeds, fails terminally, or the attempt budget
    /// is spent. `op` receives the 1-based attempt number.
    ///
    /// Returns the last error unchanged when giving up. A cancellation
    /// observed during a delay yields [`Retryable::cancelled`].
    pub async fn run<T, E, F, Fut>(&self, cancel: &CancelToken, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                tracing::debug!(error = %err, attempts = attempt, "Retry budget exhausted");
                return Err(err);
            }

            let Some(delay) = self.delay_for(&err, attempt) else {
                return Err(err);
            };

            tracing::warn!(
                error = %err,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(E::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::CancelHandle;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;
    use tokio::time::Instant;

    #[derive(Debug, Error, PartialEq)]
    enum TestError {
        #[error("retry after {0:?}")]
        After(Duration),
        #[error("transient")]
        Transient,
        #[error("fatal")]
        Fatal,
        #[error("cancelled")]
        Cancelled,
    }

    impl Retryable for TestError {
        fn retry_after(&self) -> Option<Duration> {
            match self {
                TestError::After(d) => Some(*d),
                _ => None,
            }
        }

        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }

        fn cancelled() -> Self {
            TestError::Cancelled
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(200), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for failed in 1..64 {
            let delay = policy.backoff(failed);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_delay_is_honored() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, TestError> = RetryPolicy::default()
            .run(&CancelToken::never(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TestError::After(Duration::from_secs(2)))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_delay_beats_backoff() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            retry_transient: true,
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let calls = AtomicU32::new(0);

        let _: Result<(), TestError> = policy
            .run(&CancelToken::never(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TestError::After(Duration::from_millis(500)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = RetryPolicy::default()
            .run(&CancelToken::never(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_not_retried_by_default() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = RetryPolicy::default()
            .run(&CancelToken::never(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_backoff_when_enabled() {
        let policy = RetryPolicy {
            retry_transient: true,
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let attempts = AtomicU32::new(0);

        let result: Result<(), TestError> = policy
            .run(&CancelToken::never(), |attempt| {
                attempts.store(attempt, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s between the four attempts
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert!(start.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let result: Result<(), TestError> = policy
            .run(&CancelToken::never(), |attempt| async move {
                Err(TestError::After(Duration::from_secs(u64::from(attempt))))
            })
            .await;

        assert_eq!(result, Err(TestError::After(Duration::from_secs(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let (handle, token) = CancelHandle::new();
        let start = Instant::now();

        let policy = RetryPolicy::default();
        let run = policy.run(&token, |_| async {
            Err::<(), _>(TestError::After(Duration::from_secs(3600)))
        });
        let cancel_soon = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        };

        let (result, ()) = tokio::join!(run, cancel_soon);
        assert_eq!(result, Err(TestError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
