//! Retry with exponential backoff

use std::future::Future;
use std::time::Duration;

/// Backoff schedule for archive writes
///
/// The delay before retry `n` (zero based) is `offset + base * 2^n`,
/// capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub offset: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            base_delay: Duration::from_secs(1),
            offset: Duration::from_secs(15),
            max_delay: Duration::from_secs(900),
        }
    }
}

/// Last error of a failed run and how many attempts were made
#[derive(Debug)]
pub struct Attempted<E> {
    pub attempts: u32,
    pub error: E,
}

impl RetryPolicy {
    /// Policy that retries immediately, for tests and in-memory stores
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            offset: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let backoff = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);
        self.offset.saturating_add(backoff).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out
    ///
    /// `on_retry` is called with the attempt number, the error and the delay
    /// before the next attempt.
    pub async fn run<F, Fut, T, E, P, C>(
        &self,
        mut op: F,
        is_transient: P,
        mut on_retry: C,
    ) -> Result<T, Attempted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        C: FnMut(u32, &E, Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= max_attempts || !is_transient(&error) => {
                    return Err(Attempted {
                        attempts: attempt,
                        error,
                    })
                }
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt - 1);
                    on_retry(attempt, &error, delay);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
