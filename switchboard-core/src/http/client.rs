//! HTTP client implementation using reqwest

use crate::http::{RequestOptions, DEFAULT_REQUEST_TIMEOUT};
use crate::providers::error::{ProviderError, ProviderResult};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("switchboard/", env!("CARGO_PKG_VERSION"));

/// Header name/value pairs attached to one request
pub type Headers = Vec<(&'static str, String)>;

/// Shared HTTP client with connection pooling
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> ProviderResult<Self> {
        Self::with_config(Duration::from_secs(10), DEFAULT_REQUEST_TIMEOUT, 10)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> ProviderResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// POST a JSON body and decode a JSON reply
    ///
    /// One call is one upstream attempt; retries belong to the caller.
    pub async fn post_json<B, T>(
        &self,
        provider: &str,
        url: &str,
        headers: Headers,
        body: &B,
        options: RequestOptions,
    ) -> ProviderResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request_id = options.request_id;
        debug!(provider = %provider, %request_id, url = %url, "Sending upstream request");

        let builder = self
            .client
            .post(url)
            .timeout(options.timeout)
            .json(body);
        let response = self
            .send(provider, with_headers(builder, headers), &options)
            .await?;

        Self::validate_content_type(&response, request_id)?;
        self.check_content_length(&response, request_id)?;

        let response_text = response.text().await.map_err(|e| {
            ProviderError::Network(format!(
                "Failed to read response body: {} [request_id: {}]",
                e, request_id
            ))
        })?;

        if response_text.len() > self.max_response_size {
            return Err(ProviderError::ParseError(format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                response_text.len(),
                self.max_response_size,
                request_id
            )));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!(provider = %provider, %request_id, error = %e, "Failed to parse upstream response");
            ProviderError::ParseError(format!(
                "Invalid response format: {} [request_id: {}]",
                e, request_id
            ))
        })
    }

    /// Issue a GET and succeed on any 2xx status
    pub async fn probe(
        &self,
        provider: &str,
        url: &str,
        headers: Headers,
        options: RequestOptions,
    ) -> ProviderResult<()> {
        let builder = self.client.get(url).timeout(options.timeout);
        self.send(provider, with_headers(builder, headers), &options)
            .await
            .map(|_| ())
    }

    async fn send(
        &self,
        provider: &str,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> ProviderResult<Response> {
        let request_id = options.request_id;
        let response = builder
            .header("X-Request-ID", request_id.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(provider = %provider, %request_id, "Request timeout");
                    ProviderError::Timeout(options.timeout)
                } else if e.is_connect() {
                    warn!(provider = %provider, %request_id, error = %e, "Connection error");
                    ProviderError::Network(format!(
                        "Connection failed: {} [request_id: {}]",
                        e, request_id
                    ))
                } else {
                    warn!(provider = %provider, %request_id, error = %e, "Request error");
                    ProviderError::Network(format!("{} [request_id: {}]", e, request_id))
                }
            })?;

        let status = response.status();
        debug!(provider = %provider, %request_id, %status, "Upstream responded");

        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(crate::http::error::map_http_error(status, body, request_id));
        }

        Ok(response)
    }

    /// Validate response content type
    fn validate_content_type(response: &Response, request_id: Uuid) -> ProviderResult<()> {
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type_str = content_type.to_str().unwrap_or("").to_lowercase();

            if !content_type_str.contains("application/json") {
                return Err(ProviderError::ParseError(format!(
                    "Expected application/json, got: {} [request_id: {}]",
                    content_type_str, request_id
                )));
            }
        }

        Ok(())
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response, request_id: Uuid) -> ProviderResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(ProviderError::ParseError(format!(
                    "Response size {} exceeds maximum {} [request_id: {}]",
                    content_length, self.max_response_size, request_id
                )));
            }
        }

        Ok(())
    }
}

fn with_headers(mut builder: RequestBuilder, headers: Headers) -> RequestBuilder {
    for (key, value) in headers {
        builder = builder.header(key, value);
    }
    builder
}
