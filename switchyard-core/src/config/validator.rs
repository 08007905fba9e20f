//! Configuration validation utilities

use super::env::ENV_VAR_PATTERN;
use super::error::ValidationError;
use super::schema::GatewayConfig;
use super::secrets::is_sensitive_field;
use regex::Regex;
use tracing::warn;

/// Configuration validator with cross-field rules
pub struct ConfigValidator {
    /// AWS region names such as `us-east-1` or `ap-southeast-2`
    region_pattern: Regex,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self {
            region_pattern: Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d+$").expect("valid regex"),
        }
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_unresolved_placeholders(config)?;
        self.validate_region(config)?;
        self.validate_routing(config)?;

        Ok(())
    }

    /// Placeholders that survived interpolation mean a key was never resolved
    fn validate_unresolved_placeholders(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        let keys = [
            ("backends.azure.api_key", config.backends.azure.as_ref().map(|a| &a.api_key)),
            ("backends.bedrock.api_key", config.backends.bedrock.as_ref().map(|b| &b.api_key)),
        ];

        for (path, key) in keys {
            let Some(key) = key else { continue };
            if let Some(var) = self.extract_env_vars(key.expose_secret()).first() {
                return Err(ValidationError::invalid_format(
                    path,
                    format!("unresolved environment variable '{}'", var),
                ));
            }
        }

        Ok(())
    }

    fn validate_region(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        if let Some(bedrock) = &config.backends.bedrock {
            if !self.region_pattern.is_match(&bedrock.region) {
                return Err(ValidationError::invalid_value(
                    "backends.bedrock.region",
                    "an AWS region such as us-east-1",
                    bedrock.region.clone(),
                ));
            }
        }

        Ok(())
    }

    /// The primary backend and every alias target must be usable
    fn validate_routing(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        let backends = &config.backends;

        if !backends.azure_enabled() && !backends.bedrock_enabled() {
            return Err(ValidationError::required("backends")
                .with_context("At least one backend must be enabled"));
        }

        if !backends.is_enabled(config.routing.primary) {
            return Err(ValidationError::incompatible(
                "routing.primary",
                format!("primary backend '{}' is not enabled", config.routing.primary),
            ));
        }

        for (i, alias) in config.routing.aliases.iter().enumerate() {
            if !backends.is_enabled(alias.provider) {
                return Err(ValidationError::incompatible(
                    format!("routing.aliases[{}].provider", i),
                    format!("backend '{}' is not enabled", alias.provider),
                ));
            }
        }

        let disabled = [
            ("azure", backends.azure.as_ref().is_some_and(|a| !a.enabled)),
            ("bedrock", backends.bedrock.as_ref().is_some_and(|b| !b.enabled)),
        ];
        for (name, is_disabled) in disabled {
            if is_disabled {
                warn!(backend = name, "backend configured but disabled");
            }
        }

        Ok(())
    }

    /// Check if a field name appears to contain sensitive information
    pub fn is_sensitive_field(&self, field_name: &str) -> bool {
        is_sensitive_field(field_name)
    }

    /// Extract environment variable names from a string
    pub fn extract_env_vars(&self, text: &str) -> Vec<String> {
        ENV_VAR_PATTERN
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}
