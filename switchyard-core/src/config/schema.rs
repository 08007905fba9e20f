//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::{SafeLogging, SecretString};
use crate::providers::ProviderKind;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Schema version understood by this release
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure for the gateway
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Backend credentials and endpoints
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Alias routing
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Circuit breaker and retry tuning
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Degraded-service behavior
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            backends: BackendsConfig::default(),
            routing: RoutingConfig::default(),
            resilience: ResilienceConfig::default(),
            fallback: FallbackConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

/// Configured backends; each one is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrock: Option<BedrockConfig>,
}

impl BackendsConfig {
    /// Azure section present, enabled and carrying a key
    pub fn azure_enabled(&self) -> bool {
        self.azure
            .as_ref()
            .is_some_and(|azure| azure.enabled && !azure.api_key.is_empty())
    }

    /// Bedrock section present, enabled and carrying a key
    pub fn bedrock_enabled(&self) -> bool {
        self.bedrock
            .as_ref()
            .is_some_and(|bedrock| bedrock.enabled && !bedrock.api_key.is_empty())
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Azure => self.azure_enabled(),
            ProviderKind::Bedrock => self.bedrock_enabled(),
        }
    }
}

/// Azure-hosted Responses API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: String,

    /// Resource key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Optional `api-version` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AzureConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: None,
            enabled: true,
        }
    }
}

impl SafeLogging for AzureConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "azure(endpoint={}, api_key={}, enabled={})",
            self.endpoint, self.api_key, self.enabled
        )
    }
}

/// AWS Bedrock Converse API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockConfig {
    /// Override for the regional runtime endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Bedrock API key, sent as a bearer token
    pub api_key: SecretString,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl BedrockConfig {
    pub fn new(region: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            endpoint: None,
            region: region.into(),
            api_key: api_key.into(),
            enabled: true,
        }
    }
}

impl SafeLogging for BedrockConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "bedrock(region={}, endpoint={}, api_key={}, enabled={})",
            self.region,
            self.endpoint.as_deref().unwrap_or("default"),
            self.api_key,
            self.enabled
        )
    }
}

/// Routing configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Backend for aliases that are not in any table
    #[serde(default)]
    pub primary: ProviderKind,

    /// Extra aliases; these replace built-in entries of the same name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<ModelAlias>,
}

/// One alias mapping
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelAlias {
    /// Name clients send
    pub alias: String,

    /// Backend that serves it
    pub provider: ProviderKind,

    /// Deployment name or model id on that backend
    pub model: String,
}

/// Resilience tuning shared by every backend
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Fallback configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Answer failed requests from cache or with a placeholder
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep successful answers for reuse during outages
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    /// Idle connection keep-alive in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
            keepalive_secs: default_keepalive(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_region() -> String { "us-east-1".to_string() }
fn default_cache_ttl() -> u64 { 300 }
fn default_cache_capacity() -> u64 { 1000 }
fn default_connect_timeout() -> u64 { 10000 }
fn default_request_timeout() -> u64 { 60000 }
fn default_max_idle() -> usize { 10 }
fn default_keepalive() -> u64 { 90 }

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.backends.azure.is_none() && self.backends.bedrock.is_none() {
            return Err(ValidationError::required("backends")
                .with_context("At least one backend must be configured"));
        }

        if let Some(azure) = &self.backends.azure {
            azure.validate("backends.azure")?;
        }
        if let Some(bedrock) = &self.backends.bedrock {
            bedrock.validate("backends.bedrock")?;
        }

        let mut seen_aliases = HashSet::new();
        for (i, alias) in self.routing.aliases.iter().enumerate() {
            let path = format!("routing.aliases[{}]", i);
            if alias.alias.is_empty() {
                return Err(ValidationError::required(format!("{}.alias", path)));
            }
            if alias.model.is_empty() {
                return Err(ValidationError::required(format!("{}.model", path)));
            }
            if !seen_aliases.insert(alias.alias.as_str()) {
                return Err(ValidationError::new(
                    format!("{}.alias", path),
                    ValidationErrorKind::DuplicateValue {
                        value: alias.alias.clone(),
                    },
                ));
            }
        }

        validate_circuit_breaker(&self.resilience.circuit_breaker, "resilience.circuit_breaker")?;
        validate_retry(&self.resilience.retry, "resilience.retry")?;
        self.fallback.validate("fallback")?;
        self.connection.validate("connection")?;

        Ok(())
    }
}

impl AzureConfig {
    /// Validate Azure backend configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::required(format!("{}.endpoint", path)));
        }
        validate_url(&self.endpoint, &format!("{}.endpoint", path))?;

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if let Some(version) = &self.api_version {
            if version.trim().is_empty() {
                return Err(ValidationError::invalid_format(
                    format!("{}.api_version", path),
                    "Must not be blank when present",
                ));
            }
        }

        Ok(())
    }
}

impl BedrockConfig {
    /// Validate Bedrock backend configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.region.is_empty() {
            return Err(ValidationError::required(format!("{}.region", path)));
        }

        if let Some(endpoint) = &self.endpoint {
            validate_url(endpoint, &format!("{}.endpoint", path))?;
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        Ok(())
    }
}

impl FallbackConfig {
    /// Validate fallback configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.cache_enabled {
            if self.cache_ttl_secs == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.cache_ttl_secs", path),
                    "Must be greater than 0",
                ));
            }
            if self.cache_capacity == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.cache_capacity", path),
                    "Must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate connection settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.request_timeout_ms < self.connect_timeout_ms {
            return Err(ValidationError::new(
                format!("{}.request_timeout_ms", path),
                ValidationErrorKind::Incompatible {
                    message: "Must be >= connect_timeout_ms".to_string(),
                },
            ));
        }

        Ok(())
    }
}

fn validate_circuit_breaker(config: &CircuitBreakerConfig, path: &str) -> Result<(), ValidationError> {
    if config.failure_threshold == 0 {
        return Err(ValidationError::out_of_range(
            format!("{}.failure_threshold", path),
            "Must be greater than 0",
        ));
    }

    if config.initial_backoff_ms == 0 {
        return Err(ValidationError::out_of_range(
            format!("{}.initial_backoff_ms", path),
            "Must be greater than 0",
        ));
    }

    if config.max_backoff_ms < config.initial_backoff_ms {
        return Err(ValidationError::new(
            format!("{}.max_backoff_ms", path),
            ValidationErrorKind::Incompatible {
                message: "Must be >= initial_backoff_ms".to_string(),
            },
        ));
    }

    if config.backoff_multiplier < 1.0 {
        return Err(ValidationError::out_of_range(
            format!("{}.backoff_multiplier", path),
            "Must be at least 1.0",
        ));
    }

    Ok(())
}

fn validate_retry(policy: &RetryPolicy, path: &str) -> Result<(), ValidationError> {
    if policy.max_attempts == 0 {
        return Err(ValidationError::out_of_range(
            format!("{}.max_attempts", path),
            "Must be at least 1",
        ));
    }

    if policy.max_delay_ms < policy.base_delay_ms {
        return Err(ValidationError::new(
            format!("{}.max_delay_ms", path),
            ValidationErrorKind::Incompatible {
                message: "Must be >= base_delay_ms".to_string(),
            },
        ));
    }

    if policy.multiplier < 1.0 {
        return Err(ValidationError::out_of_range(
            format!("{}.multiplier", path),
            "Must be at least 1.0",
        ));
    }

    if !(0.0..=1.0).contains(&policy.jitter_factor) {
        return Err(ValidationError::out_of_range(
            format!("{}.jitter_factor", path),
            "Must be between 0.0 and 1.0",
        ));
    }

    if policy.timeout_ms == Some(0) {
        return Err(ValidationError::out_of_range(
            format!("{}.timeout_ms", path),
            "Must be greater than 0 when set",
        ));
    }

    Ok(())
}

/// Require an absolute http(s) URL
fn validate_url(value: &str, path: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::new(
            path,
            ValidationErrorKind::InvalidUrl {
                message: format!("URL scheme must be http or https, got: {}", url.scheme()),
            },
        )),
        Err(e) => Err(ValidationError::new(
            path,
            ValidationErrorKind::InvalidUrl {
                message: e.to_string(),
            },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_only() -> GatewayConfig {
        GatewayConfig {
            backends: BackendsConfig {
                azure: Some(AzureConfig::new("https://example.openai.azure.com", "az-key-123456")),
                bedrock: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(azure_only().validate().is_ok());
        assert!(azure_only().backends.azure_enabled());
        assert!(!azure_only().backends.bedrock_enabled());
    }

    #[test]
    fn test_no_backends_rejected() {
        let err = GatewayConfig::default().validate().unwrap_err();
        assert_eq!(err.field_path, "backends");
    }

    #[test]
    fn test_bad_endpoint_scheme() {
        let mut config = azure_only();
        config.backends.azure.as_mut().unwrap().endpoint = "ftp://example.com".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "backends.azure.endpoint");
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }

    #[test]
    fn test_duplicate_alias() {
        let mut config = azure_only();
        let alias = ModelAlias {
            alias: "fast".to_string(),
            provider: ProviderKind::Azure,
            model: "gpt-5-mini".to_string(),
        };
        config.routing.aliases = vec![alias.clone(), alias];
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "routing.aliases[1].alias");
    }

    #[test]
    fn test_retry_bounds() {
        let mut config = azure_only();
        config.resilience.retry.max_attempts = 0;
        assert_eq!(
            config.validate().unwrap_err().field_path,
            "resilience.retry.max_attempts"
        );
    }

    #[test]
    fn test_serialized_config_hides_keys() {
        let json = serde_json::to_string(&azure_only()).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("az-key-123456"));
        assert!(azure_only()
            .backends
            .azure
            .unwrap()
            .safe_for_logging()
            .contains("api_key=[REDACTED]"));
    }
}
