//! Credential handling and redaction
//!
//! Backend keys are held in [`SecretString`], which never prints or
//! serializes its value. Diagnostics go through [`SafeLogging`] or
//! [`redact_by_field_name`].

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Placeholder written wherever a secret would appear
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper type for sensitive strings like API keys
///
/// Deserializes from a plain string. Serializes as `"[REDACTED]"`, so a
/// configuration can be dumped for diagnostics without leaking credentials.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Partially redacted form for debugging
    pub fn partial_redact(&self) -> String {
        if self.value.is_empty() {
            return "[EMPTY]".to_string();
        }

        let chars: Vec<char> = self.value.chars().collect();
        let len = chars.len();
        let edge = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

        if len <= 8 {
            REDACTED.to_string()
        } else if self.value.starts_with("sk-") || self.value.starts_with("pk-") {
            format!("{}...{}", edge(0, 3), edge(len - 4, len))
        } else {
            format!("{}...{}", edge(0, 2), edge(len - 2, len))
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A trait for types that can be logged safely
pub trait SafeLogging {
    /// One-line summary with credentials redacted
    fn safe_for_logging(&self) -> String;
}

/// How much of a sensitive value to reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionPolicy {
    /// Fully redact all sensitive fields
    #[default]
    Full,
    /// Keep a two-character prefix
    Partial,
    /// No redaction (only for secure environments)
    None,
}

const SENSITIVE_FIELDS: [&str; 8] = [
    "api_key",
    "secret",
    "token",
    "password",
    "credential",
    "auth",
    "private",
    "passphrase",
];

/// Whether a field or header name usually carries a secret
///
/// Dashes count as underscores, so `api-key` matches.
pub fn is_sensitive_field(field_name: &str) -> bool {
    let normalized = field_name.to_lowercase().replace('-', "_");
    SENSITIVE_FIELDS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

/// Redact a value based on the name of the field holding it
pub fn redact_by_field_name(field_name: &str, value: &str, policy: RedactionPolicy) -> String {
    if !is_sensitive_field(field_name) {
        return value.to_string();
    }

    match policy {
        RedactionPolicy::Full => REDACTED.to_string(),
        RedactionPolicy::Partial => {
            if value.chars().count() <= 4 {
                REDACTED.to_string()
            } else {
                format!("{}...", value.chars().take(2).collect::<String>())
            }
        }
        RedactionPolicy::None => value.to_string(),
    }
}
