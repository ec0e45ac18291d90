//! Retry driver with exponential backoff.
//!
//! Invokes a fallible operation up to `max_attempts` times. Success returns
//! immediately; a failure on the last allowed attempt is propagated as-is.
//! Between attempts the driver sleeps `base_delay`, then `2 * base_delay`,
//! `4 * base_delay`, ... with no jitter. An optional cap bounds individual
//! delays; without it the doubling is strict.
//!
//! The sleep is the only suspension point added here; dropping the returned
//! future cancels it along with the in-flight operation.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Option<Duration>,
}

impl Backoff {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: None,
        }
    }

    /// Cap every individual delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay slept after the failure of zero-based `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds or `max_attempts` calls have failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without calling `operation` if `max_attempts`
    /// is zero, otherwise the error of the final attempt.
    pub async fn execute<T, F, Fut>(&self, max_attempts: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }

        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "attempt succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) if attempt + 1 >= max_attempts => {
                    warn!(attempts = max_attempts, error = %e, "all attempts failed");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
