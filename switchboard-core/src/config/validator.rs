//! Cross-field configuration validation

use super::error::ValidationError;
use super::schema::SwitchboardConfig;
use tracing::warn;

/// Validator for rules that span several sections of the configuration
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &SwitchboardConfig) -> Result<(), ValidationError> {
        // Field-level rules first
        config.validate()?;

        self.validate_routing(config)?;
        self.warn_on_inert_providers(config);

        Ok(())
    }

    /// Routing must only reference configured providers
    fn validate_routing(&self, config: &SwitchboardConfig) -> Result<(), ValidationError> {
        let routing = &config.routing;

        if config.provider(&routing.primary).is_none() {
            return Err(
                ValidationError::unknown_provider("routing.primary", routing.primary.clone())
                    .with_context("The primary provider must appear under providers"),
            );
        }

        for (i, id) in routing.fallback_order.iter().enumerate() {
            if config.provider(id).is_none() {
                return Err(ValidationError::unknown_provider(
                    format!("routing.fallback_order[{}]", i),
                    id.clone(),
                ));
            }
        }

        if routing.request_timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                "routing.request_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if routing.health_check_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                "routing.health_check_timeout_ms",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Keyless or disabled providers are legal but never serve traffic
    fn warn_on_inert_providers(&self, config: &SwitchboardConfig) {
        for provider in &config.providers {
            if !provider.enabled {
                continue;
            }
            if provider.api_key.is_empty() {
                warn!(provider = %provider.id, "Provider has no API key and will stay unavailable");
            }
        }

        let primary_disabled = config
            .provider(&config.routing.primary)
            .is_some_and(|p| !p.enabled);
        if primary_disabled {
            warn!(
                provider = %config.routing.primary,
                "Primary provider is disabled; requests start with the fallbacks"
            );
        }
    }
}
