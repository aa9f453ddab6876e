//! Bounded retry with exponential backoff and jitter.
//!
//! Only transient failures (timeouts, temporary unavailability) are
//! retried; a source that rejected the request gets no second attempt.
//! Every delay is additionally capped by the caller's deadline.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::errors::Result;

/// Retry policy for one source gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Run `operation`, retrying transient failures until the attempt
    /// budget or `deadline` is exhausted. The last error is returned
    /// unchanged.
    pub async fn execute_with_retry<F, Fut, T>(&self, deadline: Instant, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    attempt += 1;

                    if !err.is_transient() || attempt >= self.max_attempts.max(1) {
                        return Err(err);
                    }

                    let delay = self.calculate_delay(attempt);
                    if Instant::now() + delay >= deadline {
                        return Err(err);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    /// Binary exponential backoff, capped, with ±25% jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_delay_ms);

        let final_ms = if self.enable_jitter {
            let jitter = (capped / 4) as i64;
            let random = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((capped as i64) + random as i64).max(0) as u64
        } else {
            capped
        };

        Duration::from_millis(final_ms)
    }
}
