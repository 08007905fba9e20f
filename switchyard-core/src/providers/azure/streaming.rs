//! Streaming support for Responses API answers

use super::converter::from_stream_event;
use super::types::ResponsesStreamEvent;
use crate::http::ByteStream;
use crate::providers::{ChunkStream, ProviderError};
use eventsource_stream::Eventsource;
use futures::StreamExt;

/// Parse the server-sent events of a streamed response
///
/// Events that fail to decode are logged and skipped; transport failures are
/// surfaced as stream errors.
pub fn parse_stream(stream: ByteStream) -> ChunkStream {
    let event_stream = stream.eventsource();

    Box::pin(event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                if event.data == "[DONE]" {
                    return None;
                }

                match serde_json::from_str::<ResponsesStreamEvent>(&event.data) {
                    Ok(parsed) => from_stream_event(parsed),
                    Err(e) => {
                        tracing::warn!("Failed to parse stream event: {}", e);
                        None
                    }
                }
            }
            Err(e) => Some(Err(ProviderError::Network {
                message: format!("Stream error: {}", e),
            })),
        }
    }))
}
