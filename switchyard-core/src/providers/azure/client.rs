//! Azure OpenAI Responses client implementation

use super::converter::{from_responses_response, to_responses_request};
use super::streaming::parse_stream;
use super::types::ResponsesResponse;
use crate::config::{AzureConfig, SecretString};
use crate::http::{HttpClient, RequestOptions};
use crate::protocol::{CanonicalRequest, CanonicalResponse};
use crate::providers::{ensure_valid, BackendClient, ChunkStream, ProviderKind, ProviderResult};
use async_trait::async_trait;
use tracing::debug;

/// Path of the Responses endpoint under the resource endpoint
const RESPONSES_PATH: &str = "/openai/v1/responses";

/// Backend client for Azure OpenAI's Responses API
#[derive(Debug)]
pub struct AzureResponsesClient {
    url: String,
    api_key: SecretString,
    http: HttpClient,
}

impl AzureResponsesClient {
    /// Create a client for the configured resource
    pub fn new(config: &AzureConfig, http: HttpClient) -> Self {
        let mut url = format!("{}{}", config.endpoint.trim_end_matches('/'), RESPONSES_PATH);
        if let Some(version) = &config.api_version {
            url.push_str("?api-version=");
            url.push_str(version);
        }

        debug!(url = %url, api_key = %config.api_key.partial_redact(), "azure backend configured");

        Self {
            url,
            api_key: config.api_key.clone(),
            http,
        }
    }

    /// Full URL requests are sent to
    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> [(&'static str, String); 1] {
        [("api-key", self.api_key.expose_secret().to_string())]
    }
}

#[async_trait]
impl BackendClient for AzureResponsesClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn name(&self) -> &str {
        "azure"
    }

    async fn create_response(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<CanonicalResponse> {
        ensure_valid(request, options)?;
        let mut body = to_responses_request(request);
        body.stream = false;

        let mut response: ResponsesResponse = self
            .http
            .post_json(self.name(), &self.url, &self.headers(), &body, options)
            .await?;
        if response.model.is_empty() {
            response.model = request.model.clone();
        }

        Ok(from_responses_response(response))
    }

    async fn create_response_stream(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<ChunkStream> {
        ensure_valid(request, options)?;
        let mut body = to_responses_request(request);
        body.stream = true;

        let bytes = self
            .http
            .post_stream(self.name(), &self.url, &self.headers(), &body, options)
            .await?;

        Ok(parse_stream(bytes))
    }
}
