//! Provider error types and handling

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when calling a single provider adapter
///
/// `NotInitialized` and `CircuitOpen` mean the adapter refused the call without
/// touching the network. `Network`, `Timeout`, `Http` and `ParseError` describe
/// a failed upstream call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The adapter has no accepted credential
    #[error("Provider '{0}' is not initialized")]
    NotInitialized(String),

    /// The adapter's circuit is open and no backup credential is available
    #[error("Provider '{provider}' is temporarily unavailable (circuit open, retry in {retry_in:?})")]
    CircuitOpen {
        provider: String,
        retry_in: Duration,
    },

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout occurred
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-success status
    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The request cannot be sent as given
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// The adapter refused the call before contacting the upstream
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotInitialized(_) | Self::CircuitOpen { .. })
    }

    /// The upstream call itself failed
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Http { .. } | Self::ParseError(_)
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(crate::http::DEFAULT_REQUEST_TIMEOUT)
        } else if err.is_connect() {
            ProviderError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ProviderError::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}
