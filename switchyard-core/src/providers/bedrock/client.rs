//! Bedrock Converse client implementation

use super::converter::{from_converse_response, to_converse_request};
use super::types::ConverseResponse;
use crate::config::{BedrockConfig, SecretString};
use crate::http::{HttpClient, RequestOptions};
use crate::protocol::{CanonicalRequest, CanonicalResponse};
use crate::providers::{ensure_valid, response_to_chunks, BackendClient, ChunkStream, ProviderKind, ProviderResult};
use async_trait::async_trait;
use tracing::debug;

/// Backend client for the Bedrock Converse API
#[derive(Debug)]
pub struct BedrockConverseClient {
    endpoint: String,
    region: String,
    api_key: SecretString,
    http: HttpClient,
}

impl BedrockConverseClient {
    /// Create a client for the configured region
    ///
    /// Without an explicit endpoint the regional runtime endpoint is used.
    pub fn new(config: &BedrockConfig, http: HttpClient) -> Self {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region))
            .trim_end_matches('/')
            .to_string();

        debug!(
            endpoint = %endpoint,
            region = %config.region,
            api_key = %config.api_key.partial_redact(),
            "bedrock backend configured"
        );

        Self {
            endpoint,
            region: config.region.clone(),
            api_key: config.api_key.clone(),
            http,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Converse URL for a model id; the id is percent-encoded
    pub fn converse_url(&self, model_id: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(model_id.as_bytes()).collect();
        format!("{}/model/{}/converse", self.endpoint, encoded)
    }

    fn headers(&self) -> [(&'static str, String); 1] {
        [(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )]
    }
}

#[async_trait]
impl BackendClient for BedrockConverseClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bedrock
    }

    fn name(&self) -> &str {
        "bedrock"
    }

    async fn create_response(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<CanonicalResponse> {
        ensure_valid(request, options)?;
        let body = to_converse_request(request);
        let url = self.converse_url(&request.model);

        let response: ConverseResponse = self
            .http
            .post_json(self.name(), &url, &self.headers(), &body, options)
            .await?;

        Ok(from_converse_response(response, &request.model))
    }

    /// Streams are synthesized from a single Converse call
    async fn create_response_stream(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<ChunkStream> {
        let response = self.create_response(request, options).await?;
        Ok(response_to_chunks(response))
    }
}
