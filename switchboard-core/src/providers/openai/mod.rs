//! OpenAI provider implementation
//!
//! This module provides an adapter for the OpenAI Chat Completions API,
//! translating between the uniform protocol and OpenAI's specific format.

mod client;
pub mod converter;
pub mod types;

pub use client::OpenAIAdapter;
pub use types::{OpenAIRequest, OpenAIResponse};
