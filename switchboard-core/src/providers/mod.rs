//! Provider adapters and the resilience machinery they share
//!
//! Each adapter translates the uniform protocol into one upstream API and owns
//! a [`Resilience`] (circuit breaker plus retry executor) for its calls.

pub mod adapter;
pub mod anthropic;
pub mod circuit_breaker;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod resilience;
pub mod retry;

pub use adapter::{
    validate_tools, Credentials, GenerationSettings, ModelParameters, ProviderAdapter,
    ProviderKind,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use error::{ProviderError, ProviderResult};
pub use resilience::{Resilience, ResiliencePolicy};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy};

// Re-export concrete adapters
pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;
