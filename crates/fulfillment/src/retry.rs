//! Bounded retry with a fixed pause between attempts.

use std::time::Duration;

use common::Config;

use crate::error::{FulfillmentError, Result};

/// Retries an async operation while its error is transient.
///
/// Permanent errors (validation, configuration) fail immediately; only
/// errors for which [`FulfillmentError::is_transient`] holds are
/// attempted again, up to `max_attempts` total attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with at least one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Builds the policy from the service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt_fn` until it succeeds, fails permanently, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "attempts exhausted"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}
