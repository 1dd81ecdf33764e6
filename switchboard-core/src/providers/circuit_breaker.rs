//! Per-adapter circuit breaker
//!
//! The breaker counts consecutive terminal failures. It is open while the
//! count is at or above the threshold and the last failure happened less than
//! one cooldown ago. There is no half-open probe: once the cooldown has
//! elapsed the next call simply goes through, and a failure opens a new window.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Default failure threshold before the circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default cooldown window in milliseconds
pub const DEFAULT_COOLDOWN_MS: u64 = 60_000;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time in milliseconds the circuit stays open after the last failure
    pub cooldown_ms: u64,
}

impl CircuitBreakerConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the cooldown window in milliseconds.
    #[must_use]
    pub const fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    /// The cooldown as a duration.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure bookkeeping for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitState {
    /// Consecutive terminal failures since the last success
    pub consecutive_failures: u32,
    /// When the most recent failure was recorded
    pub last_failure: Option<Instant>,
}

impl CircuitState {
    /// Remaining open time, or `None` when the circuit is closed.
    fn open_for(&self, config: &CircuitBreakerConfig, now: Instant) -> Option<Duration> {
        if self.consecutive_failures < config.failure_threshold {
            return None;
        }
        let last_failure = self.last_failure?;
        let elapsed = now.saturating_duration_since(last_failure);
        config.cooldown().checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    /// Consecutive terminal failures
    pub consecutive_failures: u32,
    /// Whether calls are currently rejected
    pub open: bool,
    /// Time until the circuit closes, when open
    pub retry_in: Option<Duration>,
}

/// A thread-safe circuit breaker owned by one adapter.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CircuitState::default()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Time left before the circuit closes, `None` when calls may proceed.
    #[must_use]
    pub fn open_for(&self) -> Option<Duration> {
        self.state.lock().open_for(&self.config, Instant::now())
    }

    /// Returns `true` while calls must be rejected.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open_for().is_some()
    }

    /// Records a successful call; the failure count goes back to zero.
    pub fn record_success(&self) {
        *self.state.lock() = CircuitState::default();
    }

    /// Records one terminal failure and returns the new failure count.
    pub fn record_failure(&self, provider: &str) -> u32 {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Instant::now());

        if state.consecutive_failures >= self.config.failure_threshold {
            warn!(
                provider = %provider,
                failures = state.consecutive_failures,
                cooldown_ms = self.config.cooldown_ms,
                "Circuit opened"
            );
        }
        state.consecutive_failures
    }

    /// Returns a copy of the raw state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        *self.state.lock()
    }

    /// Returns a diagnostic snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state();
        let retry_in = state.open_for(&self.config, Instant::now());
        CircuitSnapshot {
            consecutive_failures: state.consecutive_failures,
            open: retry_in.is_some(),
            retry_in,
        }
    }
}
