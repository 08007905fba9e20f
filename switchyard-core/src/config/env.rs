//! Environment variable interpolation for configuration
//!
//! `${NAME}` is replaced by the variable's value and `${NAME:-fallback}` uses
//! `fallback` when the variable is unset. A reference to an unset variable
//! without a fallback is an error.

use super::error::{ConfigError, ConfigResult};
use super::schema::GatewayConfig;
use super::secrets::SecretString;
use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

pub(crate) static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid regex"));

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> ConfigResult<String> {
    let mut missing: Option<String> = None;

    let result = ENV_VAR_PATTERN.replace_all(content, |cap: &Captures<'_>| {
        let var_name = &cap[1];
        match (env::var(var_name), cap.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}

/// Resolve placeholders left in a parsed configuration
///
/// Covers configurations built in code rather than loaded from a file.
pub fn interpolate_config_env_vars(config: &mut GatewayConfig) -> ConfigResult<()> {
    if let Some(azure) = config.backends.azure.as_mut() {
        azure.endpoint = interpolate_env_vars(&azure.endpoint)?;
        azure.api_key = interpolate_secret(&azure.api_key)?;
    }

    if let Some(bedrock) = config.backends.bedrock.as_mut() {
        bedrock.region = interpolate_env_vars(&bedrock.region)?;
        bedrock.api_key = interpolate_secret(&bedrock.api_key)?;
        if let Some(endpoint) = bedrock.endpoint.as_mut() {
            *endpoint = interpolate_env_vars(endpoint)?;
        }
    }

    Ok(())
}

fn interpolate_secret(secret: &SecretString) -> ConfigResult<SecretString> {
    let raw = secret.expose_secret();
    if !ENV_VAR_PATTERN.is_match(raw) {
        return Ok(secret.clone());
    }
    interpolate_env_vars(raw).map(SecretString::new)
}
