//! HTTP layer for backend calls
//!
//! This module owns everything between a backend client and the wire:
//! - Connection pooling and client management
//! - JSON and server-sent-event request execution
//! - Error mapping and retry hints from backend error payloads
//! - Request ID generation and correlation headers

pub mod client;
pub mod error;

pub use client::{ByteStream, HttpClient};
pub use error::{classify_error_message, map_http_error, parse_retry_after};

use std::time::Duration;
use uuid::Uuid;

/// Options for a single backend call
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique id of this HTTP exchange
    pub request_id: Uuid,

    /// Correlation id of the client request this call serves
    pub correlation_id: String,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RequestOptions {
    /// Options for a call serving the given client request
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Default::default()
        }
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
