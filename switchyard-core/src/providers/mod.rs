//! Backend providers
//!
//! This module implements the backend side of the gateway: the client trait
//! every backend implements, the Azure Responses and Bedrock Converse
//! clients, alias routing, and the provider error taxonomy.

pub mod adapter;
pub mod azure;
pub mod bedrock;
pub mod error;
pub mod routing;

pub use adapter::{ensure_valid, response_to_chunks, Backend, BackendClient, ChunkStream, ProviderKind};
pub use error::{ProviderError, ProviderResult};
pub use routing::{ProviderRouter, RoutingDecision};

// Re-export concrete backends
pub use azure::AzureResponsesClient;
pub use bedrock::BedrockConverseClient;
