//! HTTP layer shared by the provider adapters
//!
//! This module handles:
//! - Connection pooling and client management
//! - Request ID generation and correlation
//! - Mapping non-success responses to [`ProviderError`](crate::providers::ProviderError)

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::map_http_error;

use std::time::Duration;
use uuid::Uuid;

/// Default per-request timeout for upstream calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
