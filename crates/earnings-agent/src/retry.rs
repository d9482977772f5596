//! Retry with exponential backoff for upstream calls

use crate::config::AgentConfig;
use crate::error::{EarningsError, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How many times to try an upstream call and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_backoff: config.retry_backoff_base,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    /// Wait after the failed attempt `attempt` (zero-based): base * 2^attempt
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2_u32.saturating_pow(attempt)
    }

    /// Transport failures and rate limiting are worth another try
    fn is_retryable(error: &EarningsError) -> bool {
        matches!(
            error,
            EarningsError::NetworkError(_) | EarningsError::RateLimitExceeded { .. }
        )
    }

    pub async fn execute<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, retries = attempt, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if Self::is_retryable(&e) && attempt + 1 < self.max_attempts => {
                    let wait = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Upstream call failed, retrying in {wait:?}"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
