//! Whole-turn retry
//!
//! A failed attempt is repeated from scratch after a fixed delay, up to a
//! bounded number of retries. There is no backoff growth and no error
//! classification: every failure is retried until the budget runs out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::routes::metrics::record_retry;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Retry limits for one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Fixed wait before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `attempt` until it succeeds or the retry budget is spent.
    ///
    /// The closure receives the zero-based attempt number. The last error is
    /// returned once every attempt has failed.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut number = 0;
        loop {
            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(e) if number < self.max_retries => {
                    warn!(
                        attempt = number + 1,
                        max_attempts = self.max_attempts(),
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying after delay"
                    );
                    record_retry();
                    sleep(self.delay).await;
                    number += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
