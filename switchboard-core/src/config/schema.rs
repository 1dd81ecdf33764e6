//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::protocol::ProviderId;
use crate::providers::{Credentials, ModelParameters, ProviderKind, ResiliencePolicy};
use crate::router::{RouterConfig, DEFAULT_HEALTH_CHECK_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Schema version understood by this crate
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Upstream providers
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,

    /// Preferred provider and fallback behavior
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Retry and circuit-breaker parameters shared by all adapters
    #[serde(default)]
    pub resilience: ResilienceSettings,

    /// Shared HTTP client settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// One upstream provider
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// Routing key, e.g. "gemini"
    pub id: String,

    /// Which adapter serves this provider
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    #[serde(default)]
    pub api_key: SecretString,

    /// Secondary key used while the primary key's circuit is open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_api_key: Option<SecretString>,

    /// API root override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Disabled providers are not registered at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderSettings {
    /// Settings for `kind` under its conventional id with the given key
    pub fn new(kind: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            id: kind.default_id().to_string(),
            kind,
            api_key: api_key.into(),
            backup_api_key: None,
            base_url: None,
            model: None,
            temperature: None,
            max_output_tokens: None,
            top_k: None,
            top_p: None,
            enabled: true,
        }
    }

    /// Credentials handed to the adapter on initialization
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(self.api_key.clone());
        match &self.backup_api_key {
            Some(backup) => credentials.with_backup(backup.clone()),
            None => credentials,
        }
    }

    /// Generation parameters handed to the adapter on initialization
    pub fn parameters(&self) -> ModelParameters {
        ModelParameters {
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingSettings {
    /// Provider preferred at startup
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Providers tried after the preferred one
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<String>,

    #[serde(default = "default_true")]
    pub auto_fallback: bool,

    /// Ceiling for one whole request across all candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_ms: u64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback_order: default_fallback_order(),
            auto_fallback: true,
            request_timeout_ms: None,
            health_check_timeout_ms: default_health_check_timeout(),
        }
    }
}

impl RoutingSettings {
    /// The router configuration these settings describe
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            primary: ProviderId::from(self.primary.as_str()),
            fallback_order: self
                .fallback_order
                .iter()
                .map(|id| ProviderId::from(id.as_str()))
                .collect(),
            auto_fallback: self.auto_fallback,
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            health_check_timeout: Duration::from_millis(self.health_check_timeout_ms),
        }
    }
}

/// Retry and circuit-breaker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceSettings {
    /// Total attempts per upstream call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    #[serde(default)]
    pub jitter_factor: f64,

    /// Consecutive failed calls that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter_factor: 0.0,
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown(),
        }
    }
}

impl ResilienceSettings {
    /// The policy every adapter is created with
    pub fn policy(&self) -> ResiliencePolicy {
        ResiliencePolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            exponential_base: self.exponential_base,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Per-attempt request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_primary() -> String { ProviderKind::Gemini.default_id().to_string() }
fn default_fallback_order() -> Vec<String> {
    vec![
        ProviderKind::OpenAI.default_id().to_string(),
        ProviderKind::Anthropic.default_id().to_string(),
    ]
}
fn default_health_check_timeout() -> u64 { DEFAULT_HEALTH_CHECK_TIMEOUT.as_millis() as u64 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_delay() -> u64 { 1000 }
fn default_max_delay() -> u64 { 30000 }
fn default_exponential_base() -> f64 { 2.0 }
fn default_failure_threshold() -> u32 { 3 }
fn default_cooldown() -> u64 { 60000 }
fn default_connect_timeout() -> u64 { 10000 }
fn default_request_timeout() -> u64 { 30000 }
fn default_max_idle() -> usize { 10 }

impl SwitchboardConfig {
    /// A configuration with the current schema version and the given providers
    pub fn new(providers: Vec<ProviderSettings>) -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            providers,
            routing: RoutingSettings::default(),
            resilience: ResilienceSettings::default(),
            connection: ConnectionConfig::default(),
        }
    }

    /// Look up a provider entry by id
    pub fn provider(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_ids = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_ids.insert(provider.id.as_str()) {
                return Err(ValidationError::new(
                    format!("providers[{}].id", i),
                    ValidationErrorKind::DuplicateValue {
                        value: provider.id.clone(),
                    },
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        self.resilience.validate("resilience")?;
        self.connection.validate("connection")?;

        Ok(())
    }
}

impl ProviderSettings {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.id", path)));
        }

        if let Some(base_url) = &self.base_url {
            match url::Url::parse(base_url) {
                Ok(url) => {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        return Err(ValidationError::new(
                            format!("{}.base_url", path),
                            ValidationErrorKind::InvalidUrl {
                                message: format!(
                                    "URL scheme must be http or https, got: {}",
                                    url.scheme()
                                ),
                            },
                        ));
                    }
                }
                Err(e) => {
                    return Err(ValidationError::new(
                        format!("{}.base_url", path),
                        ValidationErrorKind::InvalidUrl {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(ValidationError::invalid_format(
                    format!("{}.model", path),
                    "Must not be empty",
                ));
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ValidationError::out_of_range(
                    format!("{}.temperature", path),
                    "Must be between 0.0 and 2.0",
                ));
            }
        }

        if self.max_output_tokens == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.max_output_tokens", path),
                "Must be greater than 0",
            ));
        }

        if self.top_k == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.top_k", path),
                "Must be greater than 0",
            ));
        }

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ValidationError::out_of_range(
                    format!("{}.top_p", path),
                    "Must be between 0.0 and 1.0",
                ));
            }
        }

        Ok(())
    }
}

impl ResilienceSettings {
    /// Validate retry and breaker parameters
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.max_attempts", path),
                "Must be greater than 0",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::new(
                format!("{}.max_delay_ms", path),
                ValidationErrorKind::Incompatible {
                    message: "Must be >= initial_delay_ms".to_string(),
                },
            ));
        }

        if self.exponential_base < 1.0 {
            return Err(ValidationError::out_of_range(
                format!("{}.exponential_base", path),
                "Must be at least 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ValidationError::out_of_range(
                format!("{}.jitter_factor", path),
                "Must be between 0.0 and 1.0",
            ));
        }

        if self.failure_threshold == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.failure_threshold", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate timeouts
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
