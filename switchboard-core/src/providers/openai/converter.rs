//! Conversion between the uniform protocol and OpenAI format

use super::types::*;
use crate::protocol::{GenerationResult, Message, MessageRole, ToolDefinition, ToolInvocation};
use crate::providers::adapter::GenerationSettings;
use crate::providers::error::{ProviderError, ProviderResult};
use serde_json::{Map, Value};

/// Build an OpenAI request from a uniform conversation
///
/// The system prompt becomes a leading `system` message. Function calls are
/// sent as `tool_calls` and function results as `tool` messages; the call id
/// is the function name since the uniform model carries no ids.
pub fn to_openai_request(
    messages: &[Message],
    tools: Option<&[ToolDefinition]>,
    system_prompt: Option<&str>,
    settings: &GenerationSettings,
) -> OpenAIRequest {
    let mut openai_messages = Vec::with_capacity(messages.len() + 1);

    if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
        openai_messages.push(text_message("system", prompt));
    }
    openai_messages.extend(messages.iter().filter_map(to_openai_message));

    OpenAIRequest {
        model: settings.model.clone(),
        messages: openai_messages,
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_output_tokens),
        top_p: settings.top_p,
        tools: tools
            .filter(|t| !t.is_empty())
            .map(|t| t.iter().map(to_openai_tool).collect()),
    }
}

fn text_message(role: &str, content: &str) -> OpenAIMessage {
    OpenAIMessage {
        role: role.to_string(),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

/// Convert a uniform message; function messages without a result are dropped
fn to_openai_message(message: &Message) -> Option<OpenAIMessage> {
    match message.role {
        MessageRole::System => Some(text_message("system", &message.content)),
        MessageRole::User => Some(text_message("user", &message.content)),
        MessageRole::Assistant => {
            let tool_calls = message.function_call.as_ref().map(|fc| {
                vec![OpenAIToolCall {
                    id: fc.name.clone(),
                    tool_type: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: fc.name.clone(),
                        arguments: Value::Object(fc.arguments.clone()).to_string(),
                    },
                }]
            });
            let content = if message.content.is_empty() && tool_calls.is_some() {
                None
            } else {
                Some(message.content.clone())
            };
            Some(OpenAIMessage {
                role: "assistant".to_string(),
                content,
                tool_calls,
                tool_call_id: None,
            })
        }
        MessageRole::Function => message.function_result.as_ref().map(|fr| OpenAIMessage {
            role: "tool".to_string(),
            content: Some(fr.result.to_string()),
            tool_calls: None,
            tool_call_id: Some(fr.name.clone()),
        }),
    }
}

/// Convert ToolDefinition to OpenAI format
fn to_openai_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
            parameters: Some(tool.parameters.to_value()),
        },
    }
}

/// Normalize an OpenAI response
///
/// Only the first choice is used.
pub fn from_openai_response(response: OpenAIResponse) -> ProviderResult<GenerationResult> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("Response contained no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            Ok(ToolInvocation {
                arguments: parse_arguments(&tc.function.name, &tc.function.arguments)?,
                name: tc.function.name,
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;

    Ok(GenerationResult::from_parts(
        choice.message.content.unwrap_or_default(),
        tool_calls,
    ))
}

/// Decode JSON-encoded function arguments into a map
pub fn parse_arguments(name: &str, raw: &str) -> ProviderResult<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ProviderError::ParseError(format!(
            "Arguments for '{}' are not an object: {}",
            name, other
        ))),
    }
}
