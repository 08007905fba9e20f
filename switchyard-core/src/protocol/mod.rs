//! Protocol definitions
//!
//! The canonical request/response model, its validator, and the wire shapes
//! of the two client-facing protocols.

pub mod claude;
pub mod openai;
pub mod types;
pub mod validation;

pub use types::{
    CanonicalRequest, CanonicalResponse, CanonicalStreamChunk, Input, Message, OutputBlock,
    Reasoning, ReasoningEffort, ReasoningStatus, Role, Usage, STOP_REASON_KEY,
    STOP_REASON_MAX_TOKENS,
};
pub use validation::{validate, RequestValidationError, RequestValidationKind};
