//! Router construction, by hand or from configuration

use super::{Router, RouterConfig};
use crate::config::{ConfigError, ConfigValidator, SafeLogging, SwitchboardConfig};
use crate::http::HttpClient;
use crate::protocol::ProviderId;
use crate::providers::ProviderAdapter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builder for a [`Router`] and its initial registry
pub struct RouterBuilder {
    config: RouterConfig,
    providers: Vec<(ProviderId, Arc<dyn ProviderAdapter>)>,
}

impl RouterBuilder {
    /// Start from the default routing configuration with no providers
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            providers: Vec::new(),
        }
    }

    /// Replace the whole routing configuration
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the provider preferred at startup
    pub fn primary(mut self, id: impl Into<ProviderId>) -> Self {
        self.config.primary = id.into();
        self
    }

    /// Set the fallback order
    pub fn fallback_order<I, P>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        self.config.fallback_order = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_fallback(mut self, enabled: bool) -> Self {
        self.config.auto_fallback = enabled;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_check_timeout = timeout;
        self
    }

    /// Register an adapter under `id`; later registrations replace earlier ones
    pub fn provider(mut self, id: impl Into<ProviderId>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push((id.into(), adapter));
        self
    }

    /// Build the router
    pub fn build(self) -> Router {
        let router = Router::new(self.config);
        for (id, adapter) in self.providers {
            router.register_provider(id, adapter);
        }
        router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Build a router and its adapters from a configuration
    ///
    /// Every enabled provider gets an adapter sharing one HTTP client. Missing
    /// API keys only leave that adapter uninitialized; they never fail the build.
    pub fn from_config(config: &SwitchboardConfig) -> Result<Router, ConfigError> {
        ConfigValidator::new().validate(config)?;

        let connection = &config.connection;
        let client = HttpClient::with_config(
            Duration::from_millis(connection.connect_timeout_ms),
            Duration::from_millis(connection.request_timeout_ms),
            connection.max_idle_per_host,
        )
        .map_err(ConfigError::HttpClient)?;

        let policy = config.resilience.policy();
        let mut builder = RouterBuilder::new().config(config.routing.router_config());

        for settings in config.providers.iter().filter(|p| p.enabled) {
            let mut adapter = settings.kind.create_adapter(
                client.clone(),
                settings.base_url.as_deref(),
                policy.clone(),
            );
            let credentials = settings.credentials();
            debug!(
                provider = %settings.id,
                credentials = %credentials.safe_for_logging(),
                "Initializing provider"
            );
            adapter.initialize(credentials, settings.parameters());
            builder = builder.provider(settings.id.as_str(), Arc::from(adapter));
        }

        let router = builder.build();
        let available = router.available_providers();
        info!(
            available = %available.iter().map(ProviderId::as_str).collect::<Vec<_>>().join(", "),
            primary = %router.config().primary,
            auto_fallback = router.config().auto_fallback,
            "Router ready"
        );

        Ok(router)
    }
}
