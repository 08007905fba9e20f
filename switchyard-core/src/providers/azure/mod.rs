//! Azure OpenAI backend
//!
//! Talks to the Responses API of an Azure OpenAI resource, translating
//! between the canonical model and the Responses wire format.

mod client;
pub mod converter;
mod streaming;
pub mod types;

pub use client::AzureResponsesClient;
pub use types::{ResponsesRequest, ResponsesResponse, ResponsesStreamEvent};
