//! Switchyard Core Library
//!
//! A multi-protocol LLM gateway core. Requests arrive in the Claude Messages
//! or OpenAI Chat/Completions wire format, are normalized into one canonical
//! shape, routed to an Azure Responses or Bedrock Converse backend behind a
//! circuit breaker and retry policy, and rendered back into the caller's
//! format, streamed or whole.
//!
//! The entry point is [`Gateway`]:
//!
//! ```no_run
//! use switchyard_core::config;
//! use switchyard_core::transform::ClaudeProtocol;
//! use switchyard_core::{Gateway, RequestContext};
//!
//! # async fn run(body: switchyard_core::protocol::claude::ClaudeRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::new(config::load("gateway.yaml")?)?;
//! let response = gateway
//!     .handle::<ClaudeProtocol>(&body, &RequestContext::generate())
//!     .await?;
//! println!("{}", serde_json::to_string(&response)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod resilience;
pub mod sanitize;
pub mod transform;

pub use error::{ClientError, ErrorType, GatewayError};
pub use gateway::{FrameStream, Gateway, HealthSnapshot, RequestContext, DONE_FRAME};
pub use protocol::{CanonicalRequest, CanonicalResponse, CanonicalStreamChunk};
pub use providers::{ProviderError, ProviderKind};

/// Returns the version of the library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
