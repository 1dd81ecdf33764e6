//! Protocol module for the uniform request/response model
//!
//! The router and all provider adapters speak these types. Adapters own the
//! translation to and from their upstream wire formats.

pub mod types;

pub use types::{
    duplicate_tool_name, FinishReason, FunctionCall, FunctionResult, GenerationResult, Message,
    MessageRole, ParameterSchema, ProviderId, ToolDefinition, ToolInvocation,
};
