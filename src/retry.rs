use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Errors that can tell whether another attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Bounded exponential backoff: after failed attempt `k` wait `base_delay * 2^k`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given 0-based failed attempt, saturating at `Duration::MAX`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Every delay the policy can sleep through, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts - 1).map(|a| self.delay_for(a)).collect()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts run out. Returns the last error in the failure cases.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let backoff = self.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_secs = backoff.as_secs_f64(),
                        "retrying after backoff"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
