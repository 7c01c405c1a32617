use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Bounded retry with exponential backoff for writes that can hit lock contention.
///
/// Only [`AppError::DatabaseLocked`] is retried; every other error returns
/// immediately. Delay schedule with the defaults: 200ms, 400ms, 800ms, 1600ms.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (0-indexed): `base_delay * 2^(attempt + 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt + 1)
    }

    /// Run `op` until it succeeds, fails with a non-contention error, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_contention() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        %operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Database locked, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
