//! Scrubbing of client-visible error text
//!
//! Every message that leaves the gateway on an error path goes through
//! [`sanitize_message`], whatever the client format.

use regex::Regex;
use std::sync::LazyLock;

/// Replacement for credentials
pub const API_KEY_REDACTED: &str = "api_key=[REDACTED]";

/// Replacement for bearer tokens
pub const BEARER_REDACTED: &str = "Bearer [REDACTED]";

/// Replacement for email addresses
pub const EMAIL_REDACTED: &str = "[EMAIL_REDACTED]";

static BEARER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").expect("bearer pattern is valid")
});

static API_KEY_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bapi[_-]?key\s*[=:]\s*[^\s,;&"']+"#).expect("api key pattern is valid")
});

static SECRET_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sk|pk|rk)-[A-Za-z0-9_\-]{8,}").expect("secret key pattern is valid")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email pattern is valid")
});

/// Redact credentials and personal data from a message
///
/// Idempotent: sanitizing an already sanitized message leaves it unchanged.
pub fn sanitize_message(message: &str) -> String {
    let message = BEARER_TOKEN.replace_all(message, BEARER_REDACTED);
    let message = API_KEY_ASSIGNMENT.replace_all(&message, API_KEY_REDACTED);
    let message = SECRET_KEY.replace_all(&message, API_KEY_REDACTED);
    EMAIL.replace_all(&message, EMAIL_REDACTED).into_owned()
}
