//! Backend client trait and dispatch
//!
//! Defines the seam every backend implements and the closed set of backends
//! the gateway can route to.

use crate::http::RequestOptions;
use crate::protocol::{validate, CanonicalRequest, CanonicalResponse, CanonicalStreamChunk, OutputBlock};
use crate::providers::{AzureResponsesClient, BedrockConverseClient, ProviderError, ProviderResult};
use async_trait::async_trait;
use futures::{stream, Stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Stream of canonical chunks from a backend
pub type ChunkStream = Pin<Box<dyn Stream<Item = ProviderResult<CanonicalStreamChunk>> + Send>>;

/// Core trait every backend client implements
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Backend family
    fn kind(&self) -> ProviderKind;

    /// Name used for circuit breakers, metrics and logs
    fn name(&self) -> &str;

    /// Produce a complete response
    async fn create_response(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<CanonicalResponse>;

    /// Produce a chunk stream ending in a terminal chunk
    async fn create_response_stream(
        &self,
        request: &CanonicalRequest,
        options: &RequestOptions,
    ) -> ProviderResult<ChunkStream>;
}

/// Backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Azure,
    Bedrock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "azure",
            ProviderKind::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured backend
#[derive(Debug)]
pub enum Backend {
    Azure(AzureResponsesClient),
    Bedrock(BedrockConverseClient),
}

impl Backend {
    /// The client behind this backend
    pub fn client(&self) -> &dyn BackendClient {
        match self {
            Backend::Azure(client) => client,
            Backend::Bedrock(client) => client,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.client().kind()
    }

    pub fn name(&self) -> &str {
        self.client().name()
    }
}

/// Replay a complete response as a chunk stream
///
/// Reasoning surfaces as in-progress deltas, followed by visible text, tool
/// calls, and a terminal chunk carrying the response usage.
pub fn response_to_chunks(response: CanonicalResponse) -> ChunkStream {
    let mut chunks: Vec<ProviderResult<CanonicalStreamChunk>> =
        Vec::with_capacity(response.output.len() + 1);

    for block in response.output {
        let chunk = match block {
            OutputBlock::Reasoning { content, .. } => CanonicalStreamChunk::reasoning_delta(content),
            OutputBlock::Text { text } if text.is_empty() => continue,
            OutputBlock::Text { text } => CanonicalStreamChunk::text(text),
            call @ OutputBlock::ToolCall { .. } => CanonicalStreamChunk {
                output: vec![call],
                usage: None,
            },
            OutputBlock::ToolResult { .. } => continue,
        };
        chunks.push(Ok(chunk));
    }

    chunks.push(Ok(CanonicalStreamChunk::terminal(response.usage)));
    Box::pin(stream::iter(chunks))
}

/// Reject a malformed request before it is sent to a backend
pub fn ensure_valid(request: &CanonicalRequest, options: &RequestOptions) -> ProviderResult<()> {
    validate(request, &options.correlation_id).map_err(ProviderError::Validation)
}

/// Error for a stream that ended with an in-band failure
pub(crate) fn stream_error(provider: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::Provider {
        provider: provider.to_string(),
        code: "stream_error".to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Usage;
    use futures::StreamExt;
    use std::collections::HashMap;

    #[tokio::test]
    async fn replayed_response_ends_with_terminal_chunk() {
        let response = CanonicalResponse {
            id: "r".to_string(),
            model: "m".to_string(),
            output: vec![
                OutputBlock::Reasoning {
                    content: "plan".to_string(),
                    status: crate::protocol::ReasoningStatus::Completed,
                },
                OutputBlock::text("answer"),
            ],
            usage: Usage::new(5, 6),
            metadata: HashMap::new(),
        };

        let chunks: Vec<_> = response_to_chunks(response).collect().await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].as_ref().unwrap().is_reasoning_only());
        assert_eq!(chunks[1].as_ref().unwrap(), &CanonicalStreamChunk::text("answer"));
        let last = chunks[2].as_ref().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.usage.unwrap().total_tokens, 11);
    }

    #[test]
    fn provider_kind_wire_names() {
        assert_eq!(serde_json::to_value(ProviderKind::Bedrock).unwrap(), "bedrock");
        assert_eq!(ProviderKind::Azure.to_string(), "azure");
    }
}
