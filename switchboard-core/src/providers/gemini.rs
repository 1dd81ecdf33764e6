//! Google Gemini provider implementation
//!
//! Uses the `generateContent` REST endpoint. Besides the primary key the adapter
//! may hold a backup key: while its circuit is open, a request is sent once with
//! the backup key instead of failing outright.

use crate::config::secrets::SecretString;
use crate::http::client::Headers;
use crate::http::{HttpClient, RequestOptions};
use crate::protocol::{GenerationResult, Message, MessageRole, ToolDefinition, ToolInvocation};
use crate::providers::adapter::{
    validate_tools, Credentials, GenerationSettings, ModelParameters, ProviderAdapter,
};
use crate::providers::circuit_breaker::CircuitSnapshot;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::resilience::{Resilience, ResiliencePolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::warn;

/// Public Gemini API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DISPLAY_NAME: &str = "Google Gemini";
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// generateContent request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,

    pub generation_config: GeminiGenerationConfig,
}

/// A turn, or the system instruction (which carries no role)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// One part of a turn; exactly one field is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// generateContent response
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: GeminiContent,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

fn turn(role: &str, parts: Vec<GeminiPart>) -> GeminiContent {
    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

/// Build a Gemini request from a uniform conversation
///
/// Function results that are not JSON objects are wrapped as `{"result": ...}`
/// because `functionResponse.response` must be an object.
pub fn to_gemini_request(
    messages: &[Message],
    tools: Option<&[ToolDefinition]>,
    system_prompt: Option<&str>,
    settings: &GenerationSettings,
) -> GeminiRequest {
    let mut system_parts: Vec<GeminiPart> = system_prompt
        .filter(|p| !p.is_empty())
        .map(GeminiPart::text)
        .into_iter()
        .collect();
    let mut contents = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            MessageRole::System => system_parts.push(GeminiPart::text(&message.content)),
            MessageRole::User => {
                contents.push(turn("user", vec![GeminiPart::text(&message.content)]))
            }
            MessageRole::Assistant => {
                let mut parts = Vec::new();
                if !message.content.is_empty() || message.function_call.is_none() {
                    parts.push(GeminiPart::text(&message.content));
                }
                if let Some(fc) = &message.function_call {
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            name: fc.name.clone(),
                            args: fc.arguments.clone(),
                        }),
                        ..Default::default()
                    });
                }
                contents.push(turn("model", parts));
            }
            MessageRole::Function => {
                if let Some(fr) = &message.function_result {
                    let response = match &fr.result {
                        Value::Object(map) => map.clone(),
                        other => {
                            let mut map = Map::new();
                            map.insert("result".to_string(), other.clone());
                            map
                        }
                    };
                    contents.push(turn(
                        "user",
                        vec![GeminiPart {
                            function_response: Some(GeminiFunctionResponse {
                                name: fr.name.clone(),
                                response,
                            }),
                            ..Default::default()
                        }],
                    ));
                }
            }
        }
    }

    GeminiRequest {
        contents,
        system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: system_parts,
        }),
        tools: tools.filter(|t| !t.is_empty()).map(|t| {
            vec![GeminiTool {
                function_declarations: t
                    .iter()
                    .map(|tool| GeminiFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.to_value(),
                    })
                    .collect(),
            }]
        }),
        generation_config: GeminiGenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            top_k: settings.top_k,
            top_p: settings.top_p,
        },
    }
}

/// Normalize a Gemini response from its first candidate
pub fn from_gemini_response(response: GeminiResponse) -> ProviderResult<GenerationResult> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        ProviderError::ParseError("Response contained no candidates".to_string())
    })?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.parts {
        if let Some(text) = part.text {
            content.push_str(&text);
        }
        if let Some(fc) = part.function_call {
            tool_calls.push(ToolInvocation {
                name: fc.name,
                arguments: fc.args,
            });
        }
    }

    Ok(GenerationResult::from_parts(content, tool_calls))
}

/// Gemini adapter
pub struct GeminiAdapter {
    client: HttpClient,
    base_url: String,
    settings: GenerationSettings,
    credentials: Option<Credentials>,
    resilience: Resilience,
}

impl GeminiAdapter {
    /// Create an uninitialized adapter on the public endpoint
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            settings: GenerationSettings {
                top_k: Some(40),
                top_p: Some(0.95),
                ..GenerationSettings::new("gemini-2.5-flash", 0.7, 2048)
            },
            credentials: None,
            resilience: Resilience::new(DISPLAY_NAME, ResiliencePolicy::default()),
        }
    }

    /// Point the adapter at another API root
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

    /// Whether a backup key was accepted
    pub fn has_backup_credential(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| c.backup_api_key.is_some())
    }

    fn headers(api_key: &SecretString) -> Headers {
        vec![("x-goog-api-key", api_key.expose_secret().to_string())]
    }

    async fn send(
        &self,
        api_key: &SecretString,
        request: &GeminiRequest,
    ) -> ProviderResult<GenerationResult> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.settings.model
        );
        let response: GeminiResponse = self
            .client
            .post_json(
                DISPLAY_NAME,
                &url,
                Self::headers(api_key),
                request,
                RequestOptions::new(),
            )
            .await?;
        from_gemini_response(response)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
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

        let request = to_gemini_request(messages, tools, system_prompt, &self.settings);

        if let Err(open) = self.resilience.check() {
            let Some(backup) = credentials.backup_api_key.as_ref() else {
                return Err(open);
            };
            warn!(provider = DISPLAY_NAME, "Circuit open, using backup credential");
            let mut result = self
                .resilience
                .call_once(self.send(backup, &request))
                .await?;
            result.backup_credential = true;
            return Ok(result);
        }

        let request = &request;
        let api_key = &credentials.api_key;
        self.resilience
            .call(move || self.send(api_key, request))
            .await
    }

    async fn is_healthy(&self) -> bool {
        let Some(credentials) = self.credentials.as_ref() else {
            return false;
        };
        let url = format!("{}/models/{}", self.base_url, self.settings.model);
        self.client
            .probe(
                DISPLAY_NAME,
                &url,
                Self::headers(&credentials.api_key),
                RequestOptions::new().with_timeout(HEALTH_PROBE_TIMEOUT),
            )
            .await
            .is_ok()
    }

    fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        Some(self.resilience.snapshot())
    }
}
