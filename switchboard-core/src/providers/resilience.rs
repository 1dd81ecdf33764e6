//! Circuit breaker and retry composed into one component
//!
//! Every adapter owns a [`Resilience`]. A guarded call first consults the
//! breaker, then runs the upstream operation through the retry executor, and
//! finally records exactly one outcome on the breaker: a reset on success or a
//! single increment when all attempts failed.

use crate::providers::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::retry::{RetryExecutor, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters for the shared retry and circuit-breaker behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    /// Total attempts per upstream call
    pub max_attempts: u32,
    /// Sleep after the first failed attempt
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after every failed attempt
    pub exponential_base: f64,
    /// Upper bound for a single backoff sleep
    pub max_delay: Duration,
    /// Random spread applied to each delay (0.0 disables jitter)
    pub jitter_factor: f64,
    /// Consecutive terminal failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open after the last failure
    pub cooldown: Duration,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let breaker = CircuitBreakerConfig::default();
        Self {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            exponential_base: retry.exponential_base,
            max_delay: Duration::from_millis(retry.max_delay_ms),
            jitter_factor: retry.jitter_factor,
            failure_threshold: breaker.failure_threshold,
            cooldown: breaker.cooldown(),
        }
    }
}

impl ResiliencePolicy {
    /// The retry half of the policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay_ms: self.initial_delay.as_millis() as u64,
            max_delay_ms: self.max_delay.as_millis() as u64,
            exponential_base: self.exponential_base,
            jitter_factor: self.jitter_factor,
        }
    }

    /// The circuit-breaker half of the policy
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_cooldown_ms(self.cooldown.as_millis() as u64)
    }
}

/// Retry executor and circuit breaker owned by one adapter
#[derive(Debug)]
pub struct Resilience {
    label: String,
    policy: ResiliencePolicy,
    retry: RetryExecutor,
    breaker: CircuitBreaker,
}

impl Resilience {
    /// Create the component for the adapter named `label`
    pub fn new(label: impl Into<String>, policy: ResiliencePolicy) -> Self {
        Self {
            label: label.into(),
            retry: RetryExecutor::new(policy.retry_policy()),
            breaker: CircuitBreaker::new(policy.breaker_config()),
            policy,
        }
    }

    /// Label used in log lines and errors
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The policy this component was built from
    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// The underlying breaker
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Diagnostic view of the breaker
    pub fn snapshot(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Fail with `CircuitOpen` while the breaker rejects calls
    pub fn check(&self) -> ProviderResult<()> {
        match self.breaker.open_for() {
            Some(retry_in) => Err(ProviderError::CircuitOpen {
                provider: self.label.clone(),
                retry_in,
            }),
            None => Ok(()),
        }
    }

    /// Run `operation` behind the breaker with retries
    ///
    /// The breaker is updated once per call, after the attempt sequence is
    /// over. A future dropped mid-flight records nothing.
    pub async fn call<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.check()?;

        let outcome = self.retry.execute(&self.label, operation).await;
        match outcome.result {
            Ok(value) => {
                if outcome.attempts > 1 {
                    debug!(
                        provider = %self.label,
                        attempts = outcome.attempts,
                        total_delay = ?outcome.total_delay,
                        "Upstream call recovered after retries"
                    );
                }
                self.breaker.record_success();
                Ok(value)
            }
            Err(error) => {
                let failures = self.breaker.record_failure(&self.label);
                warn!(
                    provider = %self.label,
                    attempts = outcome.attempts,
                    failures,
                    error = %error,
                    "Upstream call failed after all attempts"
                );
                Err(error)
            }
        }
    }

    /// Run `operation` exactly once, bypassing breaker and retries
    ///
    /// Used for the backup-credential path taken while the circuit is open.
    pub async fn call_once<Fut, T>(&self, operation: Fut) -> ProviderResult<T>
    where
        Fut: Future<Output = ProviderResult<T>>,
    {
        let result = operation.await;
        if let Err(ref error) = result {
            warn!(provider = %self.label, error = %error, "Single-attempt call failed");
        }
        result
    }
}
