//! Exponential-backoff retry executor
//!
//! Every failure is treated as retryable. The delay before attempt `n + 1`
//! is `base_delay * 2^n`; there is no sleep after the final attempt and the
//! last error is returned unchanged.

use async_trait::async_trait;
use instrument_shared::limits;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounds for a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: limits::DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after the zero-based failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is exhausted
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt - 1);
                warn!(
                    "Attempt {}/{} failed: {} (retrying in {:?})",
                    attempt, max_attempts, err, delay
                );
                sleeper.sleep(delay).await;
            }
        }
    }
}

/// Sleeper that records requested delays without waiting
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1000))
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<&str, String> = retry(&policy(3), &sleeper, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(format!("failure {}", n))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_always_failing_returns_last_error() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), String> = retry(&policy(4), &sleeper, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {}", n))
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        // No sleep after the final attempt
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
    }

    #[tokio::test]
    async fn test_first_try_success_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let result: Result<u32, String> = retry(&policy(3), &sleeper, move || async move { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), &str> = retry(&policy(0), &sleeper, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(64), Duration::from_millis(1000) * u32::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_uses_virtual_time() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
