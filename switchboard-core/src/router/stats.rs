//! Process-lifetime usage counters

use crate::protocol::ProviderId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated on the request path
///
/// Each counter is independently atomic; a snapshot is not a transaction
/// across counters.
#[derive(Debug, Default)]
pub struct UsageStats {
    total_requests: AtomicU64,
    fallbacks_triggered: AtomicU64,
    errors: AtomicU64,
    requests_by_provider: Mutex<BTreeMap<ProviderId, u64>>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One more request entered the router
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// `provider` served a request
    pub fn record_success(&self, provider: &ProviderId) {
        *self
            .requests_by_provider
            .lock()
            .entry(provider.clone())
            .or_insert(0) += 1;
    }

    /// A request was served by a provider other than the preferred one
    pub fn record_fallback(&self) {
        self.fallbacks_triggered.fetch_add(1, Ordering::Relaxed);
    }

    /// A request exhausted every candidate
    pub fn record_exhausted(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters into a snapshot
    pub fn snapshot(
        &self,
        current_provider: ProviderId,
        available_providers: Vec<ProviderId>,
    ) -> UsageSnapshot {
        UsageSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            requests_by_provider: self.requests_by_provider.lock().clone(),
            fallbacks_triggered: self.fallbacks_triggered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            current_provider,
            available_providers,
        }
    }
}

/// Read-only view of the router's statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    /// Calls to `generate_response`
    pub total_requests: u64,
    /// Successful requests per serving provider
    pub requests_by_provider: BTreeMap<ProviderId, u64>,
    /// Requests served by a non-preferred provider
    pub fallbacks_triggered: u64,
    /// Requests that exhausted every candidate
    pub errors: u64,
    /// The preferred provider at snapshot time
    pub current_provider: ProviderId,
    /// Registered and initialized providers, sorted
    pub available_providers: Vec<ProviderId>,
}

/// Registry entry as reported by `list_providers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub display_name: String,
    pub initialized: bool,
    pub is_current: bool,
    /// Consecutive failures, for adapters with a circuit breaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    /// Whether the adapter's circuit currently rejects calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_open: Option<bool>,
}
