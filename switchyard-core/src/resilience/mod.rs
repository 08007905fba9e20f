//! Resilience layer around backend calls
//!
//! Calls are composed as `breaker.execute(|| retry.execute(call))`: retries
//! happen inside one breaker admission, and only the final outcome counts
//! toward the breaker. When everything fails the fallback handler decides
//! whether the client sees a cached answer, a placeholder or the error.

pub mod circuit_breaker;
pub mod degradation;
pub mod fallback;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitState,
};
pub use degradation::{GracefulDegradation, ServiceLevel};
pub use fallback::{estimate_tokens, FallbackHandler, FallbackOutcome, RequestCategory, FALLBACK_KEY};
pub use retry::{
    RetryAttempt, RetryExecutor, RetryMetrics, RetryMetricsRegistry, RetryOutcome, RetryPolicy, RetryableErrors,
};
