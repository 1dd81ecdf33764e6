//! Switchboard Core Library
//!
//! Routes LLM generation requests across interchangeable provider adapters.
//! Each adapter guards its upstream with a retry executor and a circuit breaker;
//! the [`Router`] tries the preferred provider first and falls back through a
//! configured order until one succeeds.

pub mod config;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod router;

pub use config::{ConfigError, SwitchboardConfig};
pub use protocol::{FinishReason, GenerationResult, Message, ProviderId, ToolDefinition};
pub use providers::{ProviderAdapter, ProviderError};
pub use router::{Router, RouterBuilder, RouterConfig, RouterError};

/// Returns the version of the Switchboard Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
