//! Request pipeline
//!
//! A [`Gateway`] owns the backends, the router and every piece of shared
//! resilience state. Each call runs normalize → validate → route → guarded
//! backend call → render, and failures after the resilience layer go to the
//! fallback handler.

mod streaming;

pub use streaming::{frame, frame_stream, FrameStream, DONE_FRAME};

use crate::config::{ConfigError, ConfigValidator, GatewayConfig, SafeLogging};
use crate::error::{ClientError, GatewayError};
use crate::http::{HttpClient, RequestOptions};
use crate::protocol::{validate, CanonicalRequest, CanonicalResponse};
use crate::providers::{
    response_to_chunks, AzureResponsesClient, Backend, BedrockConverseClient, ChunkStream, ProviderError,
    ProviderKind, ProviderRouter, RoutingDecision,
};
use crate::resilience::{
    CircuitBreakerMetrics, CircuitBreakerRegistry, FallbackHandler, FallbackOutcome, GracefulDegradation,
    RetryExecutor, RetryMetrics, RetryMetricsRegistry, RetryPolicy, ServiceLevel,
};
use crate::transform::{ClientProtocol, StreamState};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Metadata key carrying the routing decision of a response
pub const ROUTING_KEY: &str = "routing";

/// Per-call context supplied by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    /// Context with a fresh correlation id
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

/// Observability snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub service_level: ServiceLevel,
    pub backends: Vec<ProviderKind>,
    pub circuit_breakers: BTreeMap<String, CircuitBreakerMetrics>,
    pub retries: BTreeMap<String, RetryMetrics>,
    pub unsupported_routes: u64,
}

/// The gateway
#[derive(Debug)]
pub struct Gateway {
    router: ProviderRouter,
    azure: Option<Backend>,
    bedrock: Option<Backend>,
    breakers: CircuitBreakerRegistry,
    retry_policy: RetryPolicy,
    retry_metrics: Arc<RetryMetricsRegistry>,
    degradation: GracefulDegradation,
    fallback: FallbackHandler,
    request_timeout: Duration,
}

impl Gateway {
    /// Build a gateway; the configuration is validated first
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, when no backend is enabled, or when
    /// the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        ConfigValidator::new()
            .validate(&config)
            .map_err(ConfigError::from)?;

        let http = HttpClient::from_connection(&config.connection).map_err(GatewayError::HttpClient)?;

        let azure = config
            .backends
            .azure
            .as_ref()
            .filter(|_| config.backends.azure_enabled())
            .map(|azure| {
                info!(backend = %azure.safe_for_logging(), "enabling backend");
                Backend::Azure(AzureResponsesClient::new(azure, http.clone()))
            });
        let bedrock = config
            .backends
            .bedrock
            .as_ref()
            .filter(|_| config.backends.bedrock_enabled())
            .map(|bedrock| {
                info!(backend = %bedrock.safe_for_logging(), "enabling backend");
                Backend::Bedrock(BedrockConverseClient::new(bedrock, http.clone()))
            });

        if azure.is_none() && bedrock.is_none() {
            return Err(GatewayError::NoBackends);
        }

        let breakers = CircuitBreakerRegistry::new(config.resilience.circuit_breaker.clone());
        for backend in azure.iter().chain(bedrock.iter()) {
            breakers.get_or_create(backend.name());
        }

        Ok(Self {
            router: ProviderRouter::from_config(&config),
            azure,
            bedrock,
            breakers,
            retry_policy: config.resilience.retry.clone(),
            retry_metrics: Arc::new(RetryMetricsRegistry::new()),
            degradation: GracefulDegradation::new(&config.fallback),
            fallback: FallbackHandler::new(&config.fallback),
            request_timeout: Duration::from_millis(config.connection.request_timeout_ms),
        })
    }

    /// Serve a non-streaming request in a client protocol
    pub async fn handle<P: ClientProtocol>(
        &self,
        request: &P::Request,
        ctx: &RequestContext,
    ) -> Result<P::Response, ClientError> {
        let canonical = P::to_canonical(request);
        debug!(correlation_id = %ctx.correlation_id, protocol = P::NAME, model = %canonical.model, "normalized request");
        let response = self.complete(canonical, ctx).await?;
        Ok(P::from_canonical_response(&response))
    }

    /// Serve a request and render the outcome as an HTTP status and JSON body
    pub async fn respond<P: ClientProtocol>(&self, request: &P::Request, ctx: &RequestContext) -> (u16, Value) {
        let err = match self.handle::<P>(request, ctx).await {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(body) => return (200, body),
                Err(e) => {
                    error!(correlation_id = %ctx.correlation_id, error = %e, "failed to serialize response");
                    ClientError::internal(ctx.correlation_id.clone())
                }
            },
            Err(err) => err,
        };
        (err.status_code(), P::error_body(&err))
    }

    /// Serve a streaming request in a client protocol
    ///
    /// Failures before the first backend byte are returned as `Err`; later
    /// failures become an in-band error event.
    pub async fn stream<P: ClientProtocol>(
        &self,
        request: &P::Request,
        ctx: &RequestContext,
    ) -> Result<FrameStream, ClientError> {
        let mut canonical = P::to_canonical(request);
        canonical.stream = true;
        validate(&canonical, &ctx.correlation_id).map_err(|e| ClientError::from_validation(&e))?;

        let decision = self.router.route(&canonical.model);
        info!(
            correlation_id = %ctx.correlation_id,
            protocol = P::NAME,
            model = %decision.requested_model,
            provider = %decision.provider,
            "streaming request"
        );

        let chunks = match self.open_stream(&canonical, &decision, ctx).await {
            Ok(chunks) => chunks,
            Err(err) => {
                let response = self.recover(&canonical, err, ctx)?;
                response_to_chunks(response)
            }
        };

        let state = StreamState::new(format!("resp_{}", Uuid::new_v4().simple()), &decision.requested_model);
        Ok(frame_stream::<P>(chunks, state, ctx.correlation_id.clone()))
    }

    /// Run a canonical request through routing, resilience and fallback
    pub async fn complete(
        &self,
        request: CanonicalRequest,
        ctx: &RequestContext,
    ) -> Result<CanonicalResponse, ClientError> {
        validate(&request, &ctx.correlation_id).map_err(|e| ClientError::from_validation(&e))?;

        let decision = self.router.route(&request.model);
        info!(
            correlation_id = %ctx.correlation_id,
            model = %decision.requested_model,
            provider = %decision.provider,
            supported = decision.is_supported,
            "handling request"
        );

        let mut response = match self.call_backend(&request, &decision, ctx).await {
            Ok(response) => {
                self.degradation.store(&request, &response);
                response
            }
            Err(err) => self.recover(&request, err, ctx)?,
        };

        response.normalize_output();
        response.metadata.insert(ROUTING_KEY.to_string(), json!(decision));

        info!(
            correlation_id = %ctx.correlation_id,
            response_id = %response.id,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "request completed"
        );
        Ok(response)
    }

    async fn call_backend(
        &self,
        request: &CanonicalRequest,
        decision: &RoutingDecision,
        ctx: &RequestContext,
    ) -> Result<CanonicalResponse, ProviderError> {
        let backend = self.backend(decision.provider)?;
        let client = backend.client();
        let backend_request = backend_request(request, decision);
        let options = RequestOptions::new(ctx.correlation_id.clone()).with_timeout(self.request_timeout);

        let breaker = self.breakers.get_or_create(client.name());
        let retry = self.retry_executor(client.name(), "create_response");

        let (request_ref, options_ref, retry_ref) = (&backend_request, &options, &retry);
        breaker
            .execute(move || retry_ref.execute(move || client.create_response(request_ref, options_ref)))
            .await
    }

    async fn open_stream(
        &self,
        request: &CanonicalRequest,
        decision: &RoutingDecision,
        ctx: &RequestContext,
    ) -> Result<ChunkStream, ProviderError> {
        let backend = self.backend(decision.provider)?;
        let client = backend.client();
        let backend_request = backend_request(request, decision);
        let options = RequestOptions::new(ctx.correlation_id.clone()).with_timeout(self.request_timeout);

        let breaker = self.breakers.get_or_create(client.name());
        let retry = self.retry_executor(client.name(), "create_response_stream");

        let (request_ref, options_ref, retry_ref) = (&backend_request, &options, &retry);
        let chunks = breaker
            .execute(move || retry_ref.execute(move || client.create_response_stream(request_ref, options_ref)))
            .await?;

        // Failures after the stream opened still count against the backend
        let breaker = Arc::clone(&breaker);
        Ok(Box::pin(chunks.inspect_err(move |err| breaker.record_failure(err))))
    }

    /// Map a final backend failure to a fallback answer or a client error
    fn recover(
        &self,
        request: &CanonicalRequest,
        err: ProviderError,
        ctx: &RequestContext,
    ) -> Result<CanonicalResponse, ClientError> {
        if err.is_client_error() || matches!(err, ProviderError::ModelNotAvailable { .. }) {
            return Err(ClientError::from_provider(&err, &ctx.correlation_id));
        }

        if !err.is_operational() {
            error!(correlation_id = %ctx.correlation_id, error = ?err, "unexpected gateway failure");
            return Err(ClientError::internal(ctx.correlation_id.clone()));
        }

        match self
            .fallback
            .handle(request, &err, &self.degradation, &ctx.correlation_id)
        {
            FallbackOutcome::Cached(response) | FallbackOutcome::Synthetic(response) => Ok(response),
            FallbackOutcome::Rejected(client) => Err(client),
        }
    }

    fn backend(&self, kind: ProviderKind) -> Result<&Backend, ProviderError> {
        let backend = match kind {
            ProviderKind::Azure => self.azure.as_ref(),
            ProviderKind::Bedrock => self.bedrock.as_ref(),
        };
        backend.ok_or_else(|| ProviderError::NotConfigured(kind.to_string()))
    }

    fn retry_executor(&self, backend: &str, operation: &str) -> RetryExecutor {
        RetryExecutor::new(self.retry_policy.clone())
            .with_metrics(format!("{backend}.{operation}"), Arc::clone(&self.retry_metrics))
    }

    /// Breaker metrics, retry metrics and service level
    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            service_level: self.degradation.service_level(&self.breakers),
            backends: self
                .azure
                .iter()
                .chain(self.bedrock.iter())
                .map(Backend::kind)
                .collect(),
            circuit_breakers: self.breakers.get_all_metrics(),
            retries: self.retry_metrics.get_all(),
            unsupported_routes: self.router.unsupported_routes(),
        }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    pub fn circuit_breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn retry_metrics(&self) -> &RetryMetricsRegistry {
        &self.retry_metrics
    }

    /// Clear breakers, retry counters and the response cache
    pub fn reset(&self) {
        self.breakers.reset_all();
        self.retry_metrics.reset_all();
        self.degradation.clear();
    }
}

/// Copy of the request addressed to the backend's own model id
fn backend_request(request: &CanonicalRequest, decision: &RoutingDecision) -> CanonicalRequest {
    let mut backend_request = request.clone();
    backend_request.model = decision.backend_model.clone();
    backend_request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureConfig;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.backends.azure = Some(AzureConfig::new("https://example.openai.azure.com", "az-key-123456"));
        config
    }

    #[test]
    fn health_lists_configured_backends() {
        let gateway = Gateway::new(config()).unwrap();
        let health = gateway.health();
        assert_eq!(health.backends, vec![ProviderKind::Azure]);
        assert_eq!(health.service_level, ServiceLevel::Full);
        assert!(health.circuit_breakers.contains_key("azure"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            Gateway::new(GatewayConfig::default()),
            Err(GatewayError::Config(_))
        ));
    }

    #[tokio::test]
    async fn validation_errors_skip_the_backend() {
        let gateway = Gateway::new(config()).unwrap();
        let request = CanonicalRequest::new("gpt-5", crate::protocol::Input::Messages(Vec::new()));
        let err = gateway
            .complete(request, &RequestContext::new("corr-9"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.correlation_id, "corr-9");
        assert!(gateway.health().retries.is_empty());
    }
}
