//! Uniform protocol types shared by the router and every provider adapter
//!
//! These structures are provider-agnostic. Each adapter translates them into
//! its upstream wire format and normalizes the upstream reply back into a
//! [`GenerationResult`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

/// Stable short key identifying a provider ("gemini", "openai", ...)
///
/// Used for configuration, routing order and statistics keys. It is distinct
/// from an adapter's human-readable display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user input
    User,
    /// Model output, possibly carrying a function call
    Assistant,
    /// Instructions that steer the model
    System,
    /// Result of a function the model asked to run
    Function,
}

/// A function invocation requested by the model in an earlier turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The outcome of running a function, fed back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    /// Name of the function that produced the result
    pub name: String,

    /// Opaque result payload
    pub result: Value,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content
    #[serde(default)]
    pub content: String,

    /// Function call request (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    /// Function result payload (function messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_result: Option<FunctionResult>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            function_call: None,
            function_result: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create an assistant message that requests a function call
    pub fn function_call(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, "");
        msg.function_call = Some(FunctionCall {
            name: name.into(),
            arguments,
        });
        msg
    }

    /// Create a function message carrying a function result
    pub fn function_result(name: impl Into<String>, result: Value) -> Self {
        let mut msg = Self::new(MessageRole::Function, "");
        msg.function_result = Some(FunctionResult {
            name: name.into(),
            result,
        });
        msg
    }
}

/// JSON-Schema-like description of a tool's parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Schema type, normally "object"
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    /// Parameter name to parameter schema
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Names of required parameters
    #[serde(default)]
    pub required: Vec<String>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl ParameterSchema {
    /// Add a property, optionally marking it required
    pub fn with_property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// The schema as a plain JSON value
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// A callable tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a request
    pub name: String,

    /// Free-text description shown to the model
    #[serde(default)]
    pub description: String,

    /// Parameter schema
    #[serde(default)]
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    /// Create a tool definition with an empty parameter schema
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::default(),
        }
    }

    /// Replace the parameter schema
    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Return the first tool name that appears more than once, if any
pub fn duplicate_tool_name(tools: &[ToolDefinition]) -> Option<&str> {
    let mut seen = HashSet::new();
    tools
        .iter()
        .map(|t| t.name.as_str())
        .find(|name| !seen.insert(*name))
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply
    #[default]
    Stop,
    /// The model is waiting on tool results
    ToolCalls,
}

/// Normalized reply from a provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Produced text
    pub content: String,

    /// Tool invocations in the order the model emitted them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,

    /// Finish reason
    pub finish_reason: FinishReason,

    /// Provider that served the request, stamped by the router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,

    /// Whether the adapter served this through its backup credential
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backup_credential: bool,
}

impl GenerationResult {
    /// Plain text result with `Stop` as finish reason
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Build a result from text and collected tool calls
    ///
    /// The finish reason is `ToolCalls` iff at least one invocation is present;
    /// an empty list is normalized to `None`.
    pub fn from_parts(content: String, tool_calls: Vec<ToolInvocation>) -> Self {
        if tool_calls.is_empty() {
            Self::text(content)
        } else {
            Self {
                content,
                tool_calls: Some(tool_calls),
                finish_reason: FinishReason::ToolCalls,
                ..Default::default()
            }
        }
    }

    /// Whether the model asked for any tool invocations
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}
