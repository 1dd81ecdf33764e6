//! OpenAI adapter implementation

use super::converter::{from_openai_response, to_openai_request};
use super::types::OpenAIResponse;
use crate::http::client::Headers;
use crate::http::{HttpClient, RequestOptions};
use crate::protocol::{GenerationResult, Message, ToolDefinition};
use crate::providers::adapter::{
    validate_tools, Credentials, GenerationSettings, ModelParameters, ProviderAdapter,
};
use crate::providers::circuit_breaker::CircuitSnapshot;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::resilience::{Resilience, ResiliencePolicy};
use async_trait::async_trait;
use std::time::Duration;

/// Public OpenAI API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DISPLAY_NAME: &str = "OpenAI";
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI adapter
pub struct OpenAIAdapter {
    client: HttpClient,
    base_url: String,
    settings: GenerationSettings,
    credentials: Option<Credentials>,
    resilience: Resilience,
}

impl OpenAIAdapter {
    /// Create an uninitialized adapter on the public endpoint
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            settings: GenerationSettings::new("gpt-4o-mini", 0.7, 2048),
            credentials: None,
            resilience: Resilience::new(DISPLAY_NAME, ResiliencePolicy::default()),
        }
    }

    /// Point the adapter at another API root (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the retry and circuit-breaker policy
    pub fn with_resilience(mut self, policy: ResiliencePolicy) -> Self {
        self.resilience = Resilience::new(DISPLAY_NAME, policy);
        self
    }

    /// Effective generation settings
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn headers(credentials: &Credentials) -> Headers {
        vec![(
            "Authorization",
            format!("Bearer {}", credentials.api_key.expose_secret()),
        )]
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }

    fn initialize(&mut self, credentials: Credentials, parameters: ModelParameters) {
        self.settings = self.settings.merge(parameters);
        self.credentials = credentials.accept(DISPLAY_NAME);
    }

    fn is_initialized(&self) -> bool {
        self.credentials.is_some()
    }

    async fn generate_response(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        system_prompt: Option<&str>,
    ) -> ProviderResult<GenerationResult> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ProviderError::NotInitialized(DISPLAY_NAME.to_string()))?;
        validate_tools(tools)?;

        let request = to_openai_request(messages, tools, system_prompt, &self.settings);
        let url = format!("{}/chat/completions", self.base_url);
        let (client, url, request) = (&self.client, url.as_str(), &request);

        self.resilience
            .call(move || async move {
                let response: OpenAIResponse = client
                    .post_json(
                        DISPLAY_NAME,
                        url,
                        Self::headers(credentials),
                        request,
                        RequestOptions::new(),
                    )
                    .await?;
                from_openai_response(response)
            })
            .await
    }

    async fn is_healthy(&self) -> bool {
        let Some(credentials) = self.credentials.as_ref() else {
            return false;
        };
        let url = format!("{}/models", self.base_url);
        self.client
            .probe(
                DISPLAY_NAME,
                &url,
                Self::headers(credentials),
                RequestOptions::new().with_timeout(HEALTH_PROBE_TIMEOUT),
            )
            .await
            .is_ok()
    }

    fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        Some(self.resilience.snapshot())
    }
}
