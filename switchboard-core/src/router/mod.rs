//! Multi-provider request routing
//!
//! The [`Router`] holds a registry of adapters keyed by [`ProviderId`], the
//! currently preferred provider and the fallback order. Each request tries the
//! candidates strictly one after another and returns the first success.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard_core::http::HttpClient;
//! use switchboard_core::protocol::Message;
//! use switchboard_core::providers::{Credentials, ModelParameters, OpenAIAdapter, ProviderAdapter};
//! use switchboard_core::router::{Router, RouterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut openai = OpenAIAdapter::new(HttpClient::new()?);
//! openai.initialize(Credentials::new("sk-..."), ModelParameters::default());
//!
//! let router = Router::new(RouterConfig::new("openai"));
//! router.register_provider("openai", Arc::new(openai));
//!
//! let result = router.generate_response(&[Message::user("Hello")], None, None).await?;
//! println!("{:?} answered: {}", result.provider, result.content);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod stats;

pub use builder::RouterBuilder;
pub use stats::{ProviderInfo, UsageSnapshot, UsageStats};

use crate::protocol::{GenerationResult, Message, ProviderId, ToolDefinition};
use crate::providers::{ProviderAdapter, ProviderError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default limit for a single health probe
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors surfaced by the router
#[derive(Debug, Error)]
pub enum RouterError {
    /// No adapter is registered under this id
    #[error("Unknown provider '{0}'")]
    UnknownProvider(ProviderId),

    /// The adapter is registered but holds no credentials
    #[error("Provider '{0}' is not initialized")]
    ProviderNotReady(ProviderId),

    /// Every candidate was skipped or failed
    #[error("All providers failed (attempted: {})", format_attempted(.attempted))]
    AllProvidersFailed {
        attempted: Vec<ProviderId>,
        #[source]
        last_error: Option<ProviderError>,
    },
}

fn format_attempted(attempted: &[ProviderId]) -> String {
    if attempted.is_empty() {
        "none".to_string()
    } else {
        attempted
            .iter()
            .map(ProviderId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Provider preferred at startup
    pub primary: ProviderId,

    /// Providers tried after the preferred one, in order
    pub fallback_order: Vec<ProviderId>,

    /// Whether failures fall through to `fallback_order`
    pub auto_fallback: bool,

    /// Ceiling for one whole `generate_response` call
    pub request_timeout: Option<Duration>,

    /// Limit for each adapter's health probe
    pub health_check_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            primary: ProviderId::from("gemini"),
            fallback_order: vec![ProviderId::from("openai"), ProviderId::from("anthropic")],
            auto_fallback: true,
            request_timeout: None,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
        }
    }
}

impl RouterConfig {
    /// Configuration with the given primary and no fallbacks
    pub fn new(primary: impl Into<ProviderId>) -> Self {
        Self {
            primary: primary.into(),
            fallback_order: Vec::new(),
            ..Default::default()
        }
    }

    /// Set the fallback order
    pub fn with_fallbacks<I, P>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        self.fallback_order = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable automatic fallback
    pub fn with_auto_fallback(mut self, enabled: bool) -> Self {
        self.auto_fallback = enabled;
        self
    }

    /// Bound the total duration of one request
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Bound each health probe
    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}

/// Order in which providers are tried for one request
///
/// The preferred provider comes first. With auto-fallback enabled the fallback
/// order follows, without the preferred provider and without duplicates.
pub fn candidate_order(
    preferred: &ProviderId,
    fallback_order: &[ProviderId],
    auto_fallback: bool,
) -> Vec<ProviderId> {
    let mut candidates = vec![preferred.clone()];
    if auto_fallback {
        for id in fallback_order {
            if !candidates.contains(id) {
                candidates.push(id.clone());
            }
        }
    }
    candidates
}

/// Strategy context over a registry of provider adapters
pub struct Router {
    registry: RwLock<HashMap<ProviderId, Arc<dyn ProviderAdapter>>>,
    current: RwLock<ProviderId>,
    config: RouterConfig,
    stats: UsageStats,
}

impl Router {
    /// Create a router with an empty registry
    pub fn new(config: RouterConfig) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            current: RwLock::new(config.primary.clone()),
            config,
            stats: UsageStats::new(),
        }
    }

    /// Start building a router
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// The routing configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The currently preferred provider
    pub fn current_provider(&self) -> ProviderId {
        self.current.read().clone()
    }

    /// Add or replace an adapter
    pub fn register_provider(&self, id: impl Into<ProviderId>, adapter: Arc<dyn ProviderAdapter>) {
        let id = id.into();
        info!(
            provider = %id,
            display_name = adapter.display_name(),
            initialized = adapter.is_initialized(),
            "Registering provider"
        );
        self.registry.write().insert(id, adapter);
    }

    /// Switch the preferred provider
    pub fn set_provider(&self, id: impl Into<ProviderId>) -> RouterResult<()> {
        let id = id.into();
        let ready = match self.adapter(&id) {
            Some(adapter) => adapter.is_initialized(),
            None => return Err(RouterError::UnknownProvider(id)),
        };
        if !ready {
            return Err(RouterError::ProviderNotReady(id));
        }

        info!(provider = %id, "Preferred provider changed");
        *self.current.write() = id;
        Ok(())
    }

    /// Serve a request from the first candidate that succeeds
    pub async fn generate_response(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
    ) -> RouterResult<GenerationResult> {
        self.stats.record_request();

        let preferred = self.current_provider();
        let candidates =
            candidate_order(&preferred, &self.config.fallback_order, self.config.auto_fallback);
        let mut attempted = Vec::with_capacity(candidates.len());

        let attempt =
            self.try_candidates(&candidates, messages, tools, system_prompt, &mut attempted);
        let outcome = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or_else(|_| {
                    warn!(timeout = ?limit, "Request timed out before any provider succeeded");
                    Err(Some(ProviderError::Timeout(limit)))
                }),
            None => attempt.await,
        };

        match outcome {
            Ok((id, mut result)) => {
                self.stats.record_success(&id);
                if id != preferred {
                    self.stats.record_fallback();
                    warn!(
                        provider = %id,
                        preferred = %preferred,
                        "Request served by fallback provider"
                    );
                }
                result.provider = Some(id);
                Ok(result)
            }
            Err(last_error) => {
                self.stats.record_exhausted();
                error!(
                    attempted = %format_attempted(&attempted),
                    last_error = last_error.as_ref().map(tracing::field::display),
                    "All providers failed"
                );
                Err(RouterError::AllProvidersFailed {
                    attempted,
                    last_error,
                })
            }
        }
    }

    async fn try_candidates(
        &self,
        candidates: &[ProviderId],
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
        attempted: &mut Vec<ProviderId>,
    ) -> Result<(ProviderId, GenerationResult), Option<ProviderError>> {
        let mut last_error = None;

        for id in candidates {
            let Some(adapter) = self.adapter(id) else {
                debug!(provider = %id, "Skipping unregistered provider");
                continue;
            };
            if !adapter.is_initialized() {
                debug!(provider = %id, "Skipping uninitialized provider");
                continue;
            }

            attempted.push(id.clone());
            match adapter.generate_response(messages, tools, system_prompt).await {
                Ok(result) => return Ok((id.clone(), result)),
                Err(err) => {
                    warn!(provider = %id, error = %err, "Provider failed, trying next candidate");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error)
    }

    /// Probe every registered adapter
    ///
    /// Each probe runs in its own task. A probe that panics or exceeds the
    /// health-check timeout reports `false` without affecting the others.
    pub async fn check_health(&self) -> BTreeMap<ProviderId, bool> {
        let adapters = self.adapters();
        let limit = self.config.health_check_timeout;

        let probes: Vec<_> = adapters
            .into_iter()
            .map(|(id, adapter)| {
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(limit, adapter.is_healthy())
                        .await
                        .unwrap_or(false)
                });
                (id, handle)
            })
            .collect();

        let mut health = BTreeMap::new();
        for (id, handle) in probes {
            let healthy = match handle.await {
                Ok(healthy) => healthy,
                Err(err) => {
                    warn!(provider = %id, error = %err, "Health probe aborted");
                    false
                }
            };
            health.insert(id, healthy);
        }
        health
    }

    /// Usage counters plus the current and available providers
    pub fn get_stats(&self) -> UsageSnapshot {
        self.stats
            .snapshot(self.current_provider(), self.available_providers())
    }

    /// Ids of registered adapters that hold credentials, sorted
    pub fn available_providers(&self) -> Vec<ProviderId> {
        self.adapters()
            .into_iter()
            .filter(|(_, adapter)| adapter.is_initialized())
            .map(|(id, _)| id)
            .collect()
    }

    /// Registered adapters, sorted by id
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let current = self.current_provider();
        self.adapters()
            .into_iter()
            .map(|(id, adapter)| {
                let circuit = adapter.circuit_snapshot();
                ProviderInfo {
                    display_name: adapter.display_name().to_string(),
                    initialized: adapter.is_initialized(),
                    is_current: id == current,
                    consecutive_failures: circuit.map(|c| c.consecutive_failures),
                    circuit_open: circuit.map(|c| c.open),
                    id,
                }
            })
            .collect()
    }

    fn adapter(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.registry.read().get(id).cloned()
    }

    /// Copy of the registry, sorted by id; the lock is released on return
    fn adapters(&self) -> Vec<(ProviderId, Arc<dyn ProviderAdapter>)> {
        let mut entries: Vec<_> = self
            .registry
            .read()
            .iter()
            .map(|(id, adapter)| (id.clone(), Arc::clone(adapter)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<_> = self.adapters().into_iter().map(|(id, _)| id).collect();
        f.debug_struct("Router")
            .field("providers", &providers)
            .field("current", &self.current_provider())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(names: &[&str]) -> Vec<ProviderId> {
        names.iter().map(|n| ProviderId::from(*n)).collect()
    }

    #[test]
    fn test_candidate_order_removes_preferred() {
        let order = candidate_order(&"openai".into(), &ids(&["openai", "anthropic"]), true);
        assert_eq!(order, ids(&["openai", "anthropic"]));
    }

    #[test]
    fn test_candidate_order_without_auto_fallback() {
        let order = candidate_order(&"gemini".into(), &ids(&["openai", "anthropic"]), false);
        assert_eq!(order, ids(&["gemini"]));
    }

    #[test]
    fn test_all_providers_failed_display() {
        let err = RouterError::AllProvidersFailed {
            attempted: ids(&["a", "b"]),
            last_error: Some(ProviderError::Network("reset".into())),
        };
        assert_eq!(err.to_string(), "All providers failed (attempted: a, b)");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_router_config_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.primary.as_str(), "gemini");
        assert_eq!(config.fallback_order, ids(&["openai", "anthropic"]));
        assert!(config.auto_fallback);
        assert_eq!(config.health_check_timeout, DEFAULT_HEALTH_CHECK_TIMEOUT);
    }

    proptest! {
        #[test]
        fn prop_candidate_order_invariants(
            preferred in "[a-d]",
            fallbacks in prop::collection::vec("[a-d]", 0..6),
            auto_fallback in any::<bool>(),
        ) {
            let preferred = ProviderId::from(preferred);
            let fallbacks: Vec<ProviderId> = fallbacks.into_iter().map(ProviderId::from).collect();
            let order = candidate_order(&preferred, &fallbacks, auto_fallback);

            prop_assert_eq!(&order[0], &preferred);
            let mut seen = std::collections::HashSet::new();
            prop_assert!(order.iter().all(|id| seen.insert(id.clone())));

            if auto_fallback {
                for id in &fallbacks {
                    prop_assert!(order.contains(id));
                }
                // Fallbacks keep their relative order.
                let tail: Vec<_> = order[1..].to_vec();
                let mut expected = Vec::new();
                for id in &fallbacks {
                    if id != &preferred && !expected.contains(id) {
                        expected.push(id.clone());
                    }
                }
                prop_assert_eq!(tail, expected);
            } else {
                prop_assert_eq!(order.len(), 1);
            }
        }
    }
}
