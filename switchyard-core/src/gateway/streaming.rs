//! Server-sent event framing for streamed answers
//!
//! Canonical chunks are rendered into client events one at a time as the
//! transport polls, framed as `data: <json>\n\n` and closed with
//! `data: [DONE]\n\n`. Every stream carries exactly one terminal event: the
//! backend's terminal chunk, an in-band error, or a terminal synthesized when
//! the backend stops early. Anything after the terminal event is dropped.

use crate::error::ClientError;
use crate::protocol::{CanonicalStreamChunk, Usage};
use crate::providers::{ChunkStream, ProviderResult};
use crate::transform::{ClientProtocol, StreamState};
use futures::{future, stream, Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use tracing::{debug, error, warn};

/// Framed output ready to be written to the transport
pub type FrameStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Frame closing every stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Frame one event
pub fn frame<T: Serialize>(event: &T) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(format!("data: {json}\n\n")),
        Err(e) => {
            error!(error = %e, "failed to serialize stream event");
            None
        }
    }
}

struct Pipeline {
    state: StreamState,
    correlation_id: String,
    finished: bool,
}

impl Pipeline {
    /// Frames for one upstream item; `None` marks the end of upstream
    fn step<P: ClientProtocol>(&mut self, item: Option<ProviderResult<CanonicalStreamChunk>>) -> Vec<String> {
        let events = match item {
            Some(Ok(chunk)) => {
                if chunk.is_terminal() {
                    self.finished = true;
                }
                P::stream_events(&chunk, &mut self.state)
            }
            Some(Err(err)) => {
                self.finished = true;
                warn!(
                    correlation_id = %self.correlation_id,
                    protocol = P::NAME,
                    error = %err,
                    "backend stream failed"
                );
                let client = ClientError::from_provider(&err, &self.correlation_id);
                vec![P::error_event(&client)]
            }
            None => {
                self.finished = true;
                warn!(
                    correlation_id = %self.correlation_id,
                    protocol = P::NAME,
                    "backend stream ended without a terminal chunk"
                );
                P::stream_events(&CanonicalStreamChunk::terminal(Usage::default()), &mut self.state)
            }
        };

        events.iter().filter_map(frame).collect()
    }
}

/// Render a chunk stream as framed client events
pub fn frame_stream<P: ClientProtocol>(
    chunks: ChunkStream,
    mut state: StreamState,
    correlation_id: impl Into<String>,
) -> FrameStream {
    let correlation_id = correlation_id.into();
    debug!(correlation_id = %correlation_id, protocol = P::NAME, id = %state.id, "starting stream");

    let prologue: Vec<String> = P::stream_prologue(&mut state).iter().filter_map(frame).collect();

    let pipeline = Pipeline {
        state,
        correlation_id,
        finished: false,
    };

    let body = chunks
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(pipeline, |pipeline, item| {
            if pipeline.finished {
                return future::ready(None);
            }
            future::ready(Some(pipeline.step::<P>(item)))
        })
        .flat_map(stream::iter);

    Box::pin(
        stream::iter(prologue)
            .chain(body)
            .chain(stream::once(future::ready(DONE_FRAME.to_string()))),
    )
}
