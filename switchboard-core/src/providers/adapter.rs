//! Provider adapter trait and shared adapter plumbing
//!
//! Every upstream backend implements [`ProviderAdapter`]. The router only ever
//! talks to adapters through this trait, so concrete providers, test doubles and
//! providers registered at runtime are interchangeable.

use crate::config::secrets::{SafeLogging, SecretString};
use crate::http::HttpClient;
use crate::protocol::{duplicate_tool_name, GenerationResult, Message, ToolDefinition};
use crate::providers::circuit_breaker::CircuitSnapshot;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::resilience::ResiliencePolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Uniform capability surface over one upstream generation backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Human-readable name, e.g. "Google Gemini"
    fn display_name(&self) -> &str;

    /// Store credentials and generation parameters
    ///
    /// A missing or empty primary key leaves the adapter uninitialized and logs a
    /// warning. This never fails.
    fn initialize(&mut self, credentials: Credentials, parameters: ModelParameters);

    /// Whether a credential was accepted
    fn is_initialized(&self) -> bool;

    /// Translate the request, call the upstream and normalize the reply
    async fn generate_response(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
    ) -> ProviderResult<GenerationResult>;

    /// Lightweight liveness signal; `false` on any internal error
    async fn is_healthy(&self) -> bool;

    /// Breaker state, for adapters that own one
    fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        None
    }
}

/// API key(s) for one adapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    /// Primary API key
    pub api_key: SecretString,

    /// Optional secondary key, used only by adapters that support it
    pub backup_api_key: Option<SecretString>,
}

impl Credentials {
    /// Credentials with a primary key only
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            backup_api_key: None,
        }
    }

    /// Attach a backup key; empty keys are ignored
    pub fn with_backup(mut self, backup_api_key: impl Into<SecretString>) -> Self {
        self.backup_api_key = backup_api_key.into().non_empty();
        self
    }

    /// Validate the credentials for `provider`
    ///
    /// Returns `None`, after logging a warning, when the primary key is missing.
    pub fn accept(self, provider: &str) -> Option<Self> {
        if self.api_key.is_empty() {
            warn!(provider = %provider, "No API key supplied; provider stays unavailable");
            return None;
        }
        let backup_api_key = self.backup_api_key.and_then(SecretString::non_empty);
        info!(
            provider = %provider,
            backup_credential = backup_api_key.is_some(),
            "Provider initialized"
        );
        Some(Self {
            api_key: self.api_key,
            backup_api_key,
        })
    }
}

impl SafeLogging for Credentials {
    fn safe_for_logging(&self) -> String {
        match &self.backup_api_key {
            Some(backup) => format!(
                "api_key={}, backup_api_key={}",
                self.api_key.partial_redact(),
                backup.partial_redact()
            ),
            None => format!("api_key={}", self.api_key.partial_redact()),
        }
    }
}

/// Caller-supplied generation parameters; unset fields keep adapter defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ModelParameters {
    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token limit
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Effective generation settings of an adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
}

impl GenerationSettings {
    /// Defaults with no provider-specific sampling knobs
    pub fn new(model: &str, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            max_output_tokens,
            top_k: None,
            top_p: None,
        }
    }

    /// Overlay caller parameters on these defaults
    pub fn merge(&self, parameters: ModelParameters) -> Self {
        Self {
            model: parameters
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.model.clone()),
            temperature: parameters.temperature.unwrap_or(self.temperature),
            max_output_tokens: parameters.max_output_tokens.unwrap_or(self.max_output_tokens),
            top_k: parameters.top_k.or(self.top_k),
            top_p: parameters.top_p.or(self.top_p),
        }
    }
}

/// Reject tool lists with duplicate names
pub fn validate_tools(tools: Option<&[ToolDefinition]>) -> ProviderResult<()> {
    match tools.and_then(duplicate_tool_name) {
        Some(name) => Err(ProviderError::InvalidRequest(format!(
            "Duplicate tool name '{}'",
            name
        ))),
        None => Ok(()),
    }
}

/// The reference adapters shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// All kinds, in the default priority order
    pub const ALL: [ProviderKind; 3] = [Self::Gemini, Self::OpenAI, Self::Anthropic];

    /// The conventional provider id for this kind
    pub fn default_id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Create an uninitialized adapter of this kind
    pub fn create_adapter(
        &self,
        client: HttpClient,
        base_url: Option<&str>,
        policy: ResiliencePolicy,
    ) -> Box<dyn ProviderAdapter> {
        match self {
            ProviderKind::OpenAI => {
                let mut adapter =
                    crate::providers::OpenAIAdapter::new(client).with_resilience(policy);
                if let Some(url) = base_url {
                    adapter = adapter.with_base_url(url);
                }
                Box::new(adapter)
            }
            ProviderKind::Anthropic => {
                let mut adapter =
                    crate::providers::AnthropicAdapter::new(client).with_resilience(policy);
                if let Some(url) = base_url {
                    adapter = adapter.with_base_url(url);
                }
                Box::new(adapter)
            }
            ProviderKind::Gemini => {
                let mut adapter =
                    crate::providers::GeminiAdapter::new(client).with_resilience(policy);
                if let Some(url) = base_url {
                    adapter = adapter.with_base_url(url);
                }
                Box::new(adapter)
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_id())
    }
}
