//! Gateway configuration
//!
//! Schema, loaders, environment interpolation, validation and credential
//! redaction. Files may be YAML or JSON; `${VAR}` references are resolved
//! before parsing.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_config_env_vars, interpolate_env_vars};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    AzureConfig, BackendsConfig, BedrockConfig, ConnectionConfig, FallbackConfig, GatewayConfig, ModelAlias,
    ResilienceConfig, RoutingConfig, CONFIG_VERSION,
};
pub use secrets::{is_sensitive_field, redact_by_field_name, RedactionPolicy, SafeLogging, SecretString, REDACTED};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    from_yaml_str(&content, &path.to_string_lossy())
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    from_json_str(&content, &path.to_string_lossy())
}

/// Load a configuration, picking the format from the file extension
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => load_from_yaml(path),
        Some("json") => load_from_json(path),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_string_lossy().to_string(),
        }),
    }
}

/// Parse and validate YAML text; `origin` names the source in errors
pub fn from_yaml_str(content: &str, origin: &str) -> ConfigResult<GatewayConfig> {
    let interpolated = env::interpolate_env_vars(content)?;

    let config: GatewayConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    finish(config, origin)
}

/// Parse and validate JSON text; `origin` names the source in errors
pub fn from_json_str(content: &str, origin: &str) -> ConfigResult<GatewayConfig> {
    let interpolated = env::interpolate_env_vars(content)?;

    let config: GatewayConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    finish(config, origin)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

fn finish(mut config: GatewayConfig, origin: &str) -> ConfigResult<GatewayConfig> {
    env::interpolate_config_env_vars(&mut config)?;
    ConfigValidator::new().validate(&config)?;

    debug!(
        origin = %origin,
        azure = ?config.backends.azure.as_ref().map(SafeLogging::safe_for_logging),
        bedrock = ?config.backends.bedrock.as_ref().map(SafeLogging::safe_for_logging),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderKind;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "0.1"
backends:
  azure:
    endpoint: https://example.openai.azure.com
    api_key: az-test-key-0001
  bedrock:
    region: us-west-2
    api_key: br-test-key-0001
routing:
  primary: azure
  aliases:
    - alias: sonnet
      provider: bedrock
      model: anthropic.claude-sonnet-4-20250514-v1:0
resilience:
  retry:
    max_attempts: 4
"#;
        let config = from_yaml_str(yaml, "inline").unwrap();
        assert_eq!(config.routing.primary, ProviderKind::Azure);
        assert_eq!(config.routing.aliases[0].provider, ProviderKind::Bedrock);
        assert_eq!(config.resilience.retry.max_attempts, 4);
        assert_eq!(config.resilience.retry.base_delay_ms, 100);
        assert!(config.fallback.enabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "0.1"
backends:
  azure:
    endpoint: https://example.openai.azure.com
    api_key: az-test-key-0001
    deployment: nope
"#;
        assert!(matches!(
            from_yaml_str(yaml, "inline"),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load("gateway.toml"),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
