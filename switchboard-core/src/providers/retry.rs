//! Retry policy with exponential backoff for a single upstream call
//!
//! Every attempt of the same call is retried until `max_attempts` is reached.
//! Between attempts the executor sleeps `initial_delay * base^attempt`, where
//! `attempt` is the zero-based index of the attempt that just failed.

use crate::providers::error::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts (milliseconds)
    pub max_delay_ms: u64,

    /// Base for exponential backoff (2.0 doubles the delay each time)
    pub exponential_base: f64,

    /// Jitter factor (0.0 to 1.0) to randomize delays
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom attempt budget and default backoff
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Override the first backoff delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Calculate the sleep that follows the failed attempt `attempt` (zero-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rng.gen_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Whether another attempt follows the failed attempt `attempt` (zero-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The successful value or the error of the last attempt
    pub result: Result<T, ProviderError>,

    /// Number of attempts made
    pub attempts: u32,

    /// Total time spent sleeping between attempts
    pub total_delay: Duration,
}

/// Executor for retry operations
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic
    ///
    /// `label` only feeds the log lines.
    pub async fn execute<F, T, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut total_delay = Duration::ZERO;

        loop {
            match operation().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                        total_delay,
                    };
                }
                Err(error) => {
                    warn!(
                        provider = %label,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %error,
                        "Upstream attempt failed"
                    );

                    if !self.policy.should_retry(attempt) {
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt + 1,
                            total_delay,
                        };
                    }

                    let delay = self.policy.calculate_delay(attempt);
                    debug!(provider = %label, ?delay, "Backing off before retry");
                    total_delay += delay;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
