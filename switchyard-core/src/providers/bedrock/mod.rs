//! Amazon Bedrock backend
//!
//! Talks to the Converse API with a Bedrock API key. Streamed requests are
//! answered by replaying one Converse result as a chunk sequence.

mod client;
pub mod converter;
pub mod types;

pub use client::BedrockConverseClient;
pub use types::{ConverseRequest, ConverseResponse};
