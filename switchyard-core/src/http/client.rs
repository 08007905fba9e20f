//! HTTP client implementation using reqwest

use crate::config::{redact_by_field_name, ConnectionConfig, RedactionPolicy};
use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::{ProviderError, ProviderResult};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("switchyard/", env!("CARGO_PKG_VERSION"));

/// Raw body of a streaming response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, String> {
        Self::with_config(Duration::from_secs(10), Duration::from_secs(120), 10)
    }

    /// Create a new HTTP client with custom configuration
    ///
    /// `request_timeout` is the ceiling for a whole exchange, streams
    /// included; per-call budgets come from [`RequestOptions::timeout`].
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, String> {
        Self::build_client(connect_timeout, request_timeout, max_idle_per_host, Duration::from_secs(90))
    }

    /// Create a client from the gateway's connection settings
    pub fn from_connection(config: &ConnectionConfig) -> Result<Self, String> {
        Self::build_client(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
            config.max_idle_per_host,
            Duration::from_secs(config.keepalive_secs),
        )
    }

    fn build_client(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
        idle_timeout: Duration,
    ) -> Result<Self, String> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// POST a JSON body and decode a JSON answer
    pub async fn post_json<B, R>(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
    ) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request_id = options.request_id;
        let builder = self.build(url, headers, body, options).timeout(options.timeout);
        let response = self.send(provider, builder, options).await?;

        validate_content_type(&response, "application/json")?;
        self.check_content_length(&response)?;

        let response_text = response.text().await.map_err(|e| ProviderError::Network {
            message: format!("Failed to read response body: {}", e),
        })?;

        if response_text.len() > self.max_response_size {
            return Err(ProviderError::Parse {
                message: format!(
                    "Response size {} exceeds maximum {}",
                    response_text.len(),
                    self.max_response_size
                ),
            });
        }

        let parsed = serde_json::from_str(&response_text).map_err(|e| {
            error!(
                "Failed to parse response from {} [request_id: {}]: {}",
                provider, request_id, e
            );
            ProviderError::Parse {
                message: format!("Invalid response format: {}", e),
            }
        })?;

        info!(
            "Request completed successfully for {} [request_id: {}]",
            provider, request_id
        );
        Ok(parsed)
    }

    /// POST a JSON body and return the raw event-stream body
    ///
    /// The per-call timeout bounds the time to response headers; the body is
    /// bounded by the client-wide timeout.
    pub async fn post_stream<B>(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
    ) -> ProviderResult<ByteStream>
    where
        B: Serialize + ?Sized,
    {
        let builder = self
            .build(url, headers, body, options)
            .header("Accept", "text/event-stream");
        let send = self.send(provider, builder, options);
        let response = tokio::time::timeout(options.timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout {
                after_ms: options.timeout.as_millis() as u64,
            })??;

        validate_content_type(&response, "text/event-stream")?;

        let provider = provider.to_string();
        Ok(Box::pin(response.bytes_stream().map_err(move |e| {
            warn!("Stream from {} interrupted: {}", provider, e);
            ProviderError::Network {
                message: format!("Stream interrupted: {}", e),
            }
        })))
    }

    fn build<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        options: &RequestOptions,
    ) -> RequestBuilder {
        let mut builder = self.client.post(url).json(body);

        for (key, value) in headers {
            debug!(
                header = %key,
                value = %redact_by_field_name(key, value, RedactionPolicy::Full),
                "request header"
            );
            builder = builder.header(*key, value);
        }

        builder = builder.header("X-Request-ID", options.request_id.to_string());

        if !options.correlation_id.is_empty() {
            builder = builder.header("X-Correlation-ID", &options.correlation_id);
        }

        builder
    }

    async fn send(
        &self,
        provider: &str,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> ProviderResult<Response> {
        let request_id = options.request_id;
        debug!("Executing HTTP request to {} [request_id: {}]", provider, request_id);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Request timeout for {} [request_id: {}]", provider, request_id);
                ProviderError::Timeout {
                    after_ms: options.timeout.as_millis() as u64,
                }
            } else if e.is_connect() {
                error!("Connection error for {} [request_id: {}]: {}", provider, request_id, e);
                ProviderError::Network {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                error!("Request error for {} [request_id: {}]: {}", provider, request_id, e);
                ProviderError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.ok();

            warn!(
                "Request failed with status {} for {} [request_id: {}]",
                status, provider, request_id
            );

            return Err(map_http_error(provider, status, Some(&headers), body));
        }

        Ok(response)
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> ProviderResult<()> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(ProviderError::Parse {
                    message: format!(
                        "Response size {} exceeds maximum {}",
                        content_length, self.max_response_size
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Reject responses whose declared content type is not the expected one
fn validate_content_type(response: &Response, expected: &str) -> ProviderResult<()> {
    if let Some(content_type) = response.headers().get("content-type") {
        let content_type_str = content_type.to_str().unwrap_or("").to_lowercase();

        if !content_type_str.contains(expected) {
            return Err(ProviderError::Parse {
                message: format!("Expected {}, got: {}", expected, content_type_str),
            });
        }
    }

    Ok(())
}
