//! Model alias routing

use switchyard_core::config::{AzureConfig, BedrockConfig, GatewayConfig, ModelAlias};
use switchyard_core::providers::{ProviderRouter, RoutingDecision};
use switchyard_core::ProviderKind;
use test_case::test_case;

fn config(bedrock: bool) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends.azure = Some(AzureConfig::new("https://example.openai.azure.com", "az-key-123456"));
    if bedrock {
        config.backends.bedrock = Some(BedrockConfig::new("us-east-1", "br-key-123456"));
    }
    config
}

#[test_case("gpt-5", ProviderKind::Azure, "gpt-5" ; "azure deployment")]
#[test_case("o4-mini", ProviderKind::Azure, "o4-mini" ; "azure reasoning model")]
#[test_case("claude-opus-4", ProviderKind::Bedrock, "anthropic.claude-opus-4-20250514-v1:0" ; "bedrock claude")]
#[test_case("nova-pro", ProviderKind::Bedrock, "amazon.nova-pro-v1:0" ; "bedrock nova")]
fn built_in_aliases(alias: &str, provider: ProviderKind, backend_model: &str) {
    let router = ProviderRouter::from_config(&config(true));
    assert_eq!(
        router.route(alias),
        RoutingDecision {
            provider,
            requested_model: alias.to_string(),
            backend_model: backend_model.to_string(),
            is_supported: true,
        }
    );
    assert_eq!(router.unsupported_routes(), 0);
}

#[test]
fn bedrock_aliases_absent_without_bedrock() {
    let router = ProviderRouter::from_config(&config(false));
    assert!(router.aliases().iter().all(|alias| !alias.starts_with("claude-")));

    let decision = router.route("claude-opus-4");
    assert_eq!(decision.provider, ProviderKind::Azure);
    assert_eq!(decision.backend_model, "claude-opus-4");
    assert!(!decision.is_supported);
}

#[test]
fn unknown_aliases_are_counted() {
    let router = ProviderRouter::from_config(&config(true));
    router.route("my-deployment");
    router.route("another-one");
    router.route("gpt-5");
    assert_eq!(router.unsupported_routes(), 2);
}

#[test]
fn primary_receives_unknown_aliases() {
    let mut config = config(true);
    config.routing.primary = ProviderKind::Bedrock;
    let router = ProviderRouter::from_config(&config);

    assert_eq!(router.primary(), ProviderKind::Bedrock);
    let decision = router.route("mistral.mistral-large-2407-v1:0");
    assert_eq!(decision.provider, ProviderKind::Bedrock);
    assert_eq!(decision.backend_model, "mistral.mistral-large-2407-v1:0");
}

#[test]
fn configured_aliases_extend_and_override() {
    let mut config = config(true);
    config.routing.aliases = vec![
        ModelAlias {
            alias: "sonnet".to_string(),
            provider: ProviderKind::Bedrock,
            model: "anthropic.claude-sonnet-4-20250514-v1:0".to_string(),
        },
        ModelAlias {
            alias: "gpt-5".to_string(),
            provider: ProviderKind::Azure,
            model: "gpt5-eastus-prod".to_string(),
        },
    ];
    let router = ProviderRouter::from_config(&config);

    let sonnet = router.route("sonnet");
    assert_eq!(sonnet.provider, ProviderKind::Bedrock);
    assert!(sonnet.is_supported);
    assert_eq!(router.route("gpt-5").backend_model, "gpt5-eastus-prod");
    assert!(router.aliases().contains(&"sonnet"));
}

#[test]
fn decision_serializes_for_response_metadata() {
    let router = ProviderRouter::from_config(&config(true));
    let value = serde_json::to_value(router.route("claude-sonnet-4")).unwrap();
    assert_eq!(value["provider"], "bedrock");
    assert_eq!(value["requested_model"], "claude-sonnet-4");
    assert_eq!(value["is_supported"], true);
}
