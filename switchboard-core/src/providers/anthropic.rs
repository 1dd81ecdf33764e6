//! Anthropic provider implementation
//!
//! Talks to the Messages API. The system prompt and any in-conversation system
//! messages go into the top-level `system` field; function calls and results
//! become `tool_use` / `tool_result` content blocks.

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

/// Public Anthropic API root
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Value sent in the `anthropic-version` header
pub const API_VERSION: &str = "2023-06-01";

const DISPLAY_NAME: &str = "Anthropic Claude";

/// Messages API request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub messages: Vec<AnthropicMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
}

/// One conversation turn
#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
}

/// Content block, shared by requests and responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unknown,
}

/// Tool definition
#[derive(Debug, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Messages API response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Build an Anthropic request from a uniform conversation
pub fn to_anthropic_request(
    messages: &[Message],
    tools: Option<&[ToolDefinition]>,
    system_prompt: Option<&str>,
    settings: &GenerationSettings,
) -> AnthropicRequest {
    let mut system_parts: Vec<&str> = system_prompt.into_iter().collect();
    let mut anthropic_messages = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            MessageRole::System => system_parts.push(&message.content),
            MessageRole::User => anthropic_messages.push(AnthropicMessage {
                role: "user",
                content: vec![ContentBlock::Text {
                    text: message.content.clone(),
                }],
            }),
            MessageRole::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() || message.function_call.is_none() {
                    content.push(ContentBlock::Text {
                        text: message.content.clone(),
                    });
                }
                if let Some(fc) = &message.function_call {
                    content.push(ContentBlock::ToolUse {
                        id: fc.name.clone(),
                        name: fc.name.clone(),
                        input: fc.arguments.clone(),
                    });
                }
                anthropic_messages.push(AnthropicMessage {
                    role: "assistant",
                    content,
                });
            }
            MessageRole::Function => {
                if let Some(fr) = &message.function_result {
                    anthropic_messages.push(AnthropicMessage {
                        role: "user",
                        content: vec![ContentBlock::ToolResult {
                            tool_use_id: fr.name.clone(),
                            content: fr.result.to_string(),
                        }],
                    });
                }
            }
        }
    }

    system_parts.retain(|p| !p.is_empty());
    AnthropicRequest {
        model: settings.model.clone(),
        max_tokens: settings.max_output_tokens,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages: anthropic_messages,
        temperature: Some(settings.temperature),
        top_k: settings.top_k,
        top_p: settings.top_p,
        tools: tools.filter(|t| !t.is_empty()).map(|t| {
            t.iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.parameters.to_value(),
                })
                .collect()
        }),
    }
}

/// Normalize an Anthropic response: text blocks concatenated, tool uses in order
pub fn from_anthropic_response(response: AnthropicResponse) -> GenerationResult {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::ToolUse { name, input, .. } => tool_calls.push(ToolInvocation {
                name,
                arguments: input,
            }),
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
        }
    }

    GenerationResult::from_parts(content, tool_calls)
}

/// Anthropic adapter
pub struct AnthropicAdapter {
    client: HttpClient,
    base_url: String,
    settings: GenerationSettings,
    credentials: Option<Credentials>,
    resilience: Resilience,
}

impl AnthropicAdapter {
    /// Create an uninitialized adapter on the public endpoint
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            settings: GenerationSettings::new("claude-3-5-sonnet-20241022", 0.7, 2048),
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

    fn headers(credentials: &Credentials) -> Headers {
        vec![
            ("x-api-key", credentials.api_key.expose_secret().to_string()),
            ("anthropic-version", API_VERSION.to_string()),
        ]
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
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

        let request = to_anthropic_request(messages, tools, system_prompt, &self.settings);
        let url = format!("{}/messages", self.base_url);
        let (client, url, request) = (&self.client, url.as_str(), &request);

        self.resilience
            .call(move || async move {
                let response: AnthropicResponse = client
                    .post_json(
                        DISPLAY_NAME,
                        url,
                        Self::headers(credentials),
                        request,
                        RequestOptions::new(),
                    )
                    .await?;
                Ok(from_anthropic_response(response))
            })
            .await
    }

    /// There is no cheap probe endpoint; a configured key counts as healthy.
    async fn is_healthy(&self) -> bool {
        self.credentials.is_some()
    }

    fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        Some(self.resilience.snapshot())
    }
}
