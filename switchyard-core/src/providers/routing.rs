//! Model alias routing
//!
//! Maps the model alias a client asked for onto a backend and the model
//! identifier that backend expects. Aliases come from static tables plus
//! configured overrides; Bedrock aliases only exist when Bedrock is
//! configured. Unknown aliases fall through to the primary backend unchanged.

use crate::config::{GatewayConfig, ModelAlias};
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Built-in Azure aliases (deployment names)
const AZURE_ALIASES: &[(&str, &str)] = &[
    ("gpt-5", "gpt-5"),
    ("gpt-5-mini", "gpt-5-mini"),
    ("gpt-5-nano", "gpt-5-nano"),
    ("gpt-4.1", "gpt-4.1"),
    ("gpt-4o", "gpt-4o"),
    ("gpt-4o-mini", "gpt-4o-mini"),
    ("o3", "o3"),
    ("o4-mini", "o4-mini"),
];

/// Built-in Bedrock aliases (model ids)
const BEDROCK_ALIASES: &[(&str, &str)] = &[
    ("claude-opus-4", "anthropic.claude-opus-4-20250514-v1:0"),
    ("claude-sonnet-4", "anthropic.claude-sonnet-4-20250514-v1:0"),
    ("claude-3-7-sonnet", "anthropic.claude-3-7-sonnet-20250219-v1:0"),
    ("claude-3-5-haiku", "anthropic.claude-3-5-haiku-20241022-v1:0"),
    ("llama-3-70b", "meta.llama3-70b-instruct-v1:0"),
    ("nova-pro", "amazon.nova-pro-v1:0"),
];

/// Where a request goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Backend family
    pub provider: ProviderKind,

    /// Alias the client asked for
    pub requested_model: String,

    /// Identifier sent to the backend
    pub backend_model: String,

    /// Whether the alias is known
    pub is_supported: bool,
}

/// Alias router
#[derive(Debug)]
pub struct ProviderRouter {
    primary: ProviderKind,
    routes: HashMap<String, (ProviderKind, String)>,
    unsupported_routes: AtomicU64,
}

impl ProviderRouter {
    /// Build a router from the built-in tables
    pub fn new(primary: ProviderKind, azure_enabled: bool, bedrock_enabled: bool) -> Self {
        let mut routes = HashMap::new();

        let tables = [
            (ProviderKind::Azure, azure_enabled, AZURE_ALIASES),
            (ProviderKind::Bedrock, bedrock_enabled, BEDROCK_ALIASES),
        ];
        for (provider, enabled, table) in tables {
            if !enabled {
                continue;
            }
            for (alias, model) in table {
                routes.insert((*alias).to_string(), (provider, (*model).to_string()));
            }
        }

        Self {
            primary,
            routes,
            unsupported_routes: AtomicU64::new(0),
        }
    }

    /// Build a router for a gateway configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut router = Self::new(
            config.routing.primary,
            config.backends.azure_enabled(),
            config.backends.bedrock_enabled(),
        );
        for alias in &config.routing.aliases {
            router.add_alias(alias);
        }
        router
    }

    /// Add or replace one alias
    pub fn add_alias(&mut self, alias: &ModelAlias) {
        debug!(alias = %alias.alias, provider = %alias.provider, model = %alias.model, "registering model alias");
        self.routes
            .insert(alias.alias.clone(), (alias.provider, alias.model.clone()));
    }

    /// Resolve an alias
    pub fn route(&self, alias: &str) -> RoutingDecision {
        match self.routes.get(alias) {
            Some((provider, model)) => RoutingDecision {
                provider: *provider,
                requested_model: alias.to_string(),
                backend_model: model.clone(),
                is_supported: true,
            },
            None => {
                self.unsupported_routes.fetch_add(1, Ordering::Relaxed);
                warn!(
                    model = %alias,
                    primary = %self.primary,
                    "unknown model alias, forwarding to primary backend"
                );
                RoutingDecision {
                    provider: self.primary,
                    requested_model: alias.to_string(),
                    backend_model: alias.to_string(),
                    is_supported: false,
                }
            }
        }
    }

    /// Backend used for unknown aliases
    pub fn primary(&self) -> ProviderKind {
        self.primary
    }

    /// Number of requests routed with an unknown alias
    pub fn unsupported_routes(&self) -> u64 {
        self.unsupported_routes.load(Ordering::Relaxed)
    }

    /// Every known alias, sorted
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }
}
