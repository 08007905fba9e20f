//! Retry policy and executor for backend operations
//!
//! Attempts are spaced with capped exponential backoff plus jitter. Only
//! errors on the policy's allow-list are retried; everything else, and the
//! last error after exhaustion, is returned untouched.

use crate::providers::{ProviderError, ProviderResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Errors a policy is allowed to retry
///
/// An error matches when its name, its code, or a fragment of its message is
/// listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryableErrors {
    pub names: Vec<String>,
    pub message_substrings: Vec<String>,
    pub codes: Vec<String>,
}

impl Default for RetryableErrors {
    fn default() -> Self {
        Self {
            names: ["NetworkError", "TimeoutError", "RateLimitError", "ServerError"]
                .map(String::from)
                .to_vec(),
            message_substrings: ["ECONNRESET", "socket hang up"].map(String::from).to_vec(),
            codes: ["429", "500", "502", "503", "504"].map(String::from).to_vec(),
        }
    }
}

impl RetryableErrors {
    /// Empty allow-list; nothing is retried
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            message_substrings: Vec::new(),
            codes: Vec::new(),
        }
    }

    pub fn matches(&self, error: &ProviderError) -> bool {
        let name = error.name();
        if self.names.iter().any(|n| n == name) {
            return true;
        }

        let code = error.code();
        if self.codes.iter().any(|c| *c == code) {
            return true;
        }

        let message = error.to_string();
        self.message_substrings
            .iter()
            .any(|fragment| message.contains(fragment.as_str()))
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total invocations, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds)
    pub base_delay_ms: u64,

    /// Maximum delay between attempts (milliseconds)
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Width of the random band around each delay (0.0 to 1.0)
    pub jitter_factor: f64,

    /// Per-attempt time limit (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Use the backend's Retry-After hint when present
    pub respect_retry_after: bool,

    pub retryable: RetryableErrors,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
            timeout_ms: None,
            respect_retry_after: true,
            retryable: RetryableErrors::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// More attempts with short delays, for latency-critical calls
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 5_000,
            multiplier: 1.5,
            jitter_factor: 0.2,
            ..Default::default()
        }
    }

    /// Fewer attempts with long delays, to keep load off a struggling backend
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            max_delay_ms: 15_000,
            multiplier: 3.0,
            jitter_factor: 0.3,
            ..Default::default()
        }
    }

    /// Single attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt_number` (the first retry is attempt 2)
    pub fn calculate_delay(&self, attempt_number: u32, error: &ProviderError) -> Duration {
        if attempt_number <= 1 {
            return Duration::ZERO;
        }

        if self.respect_retry_after {
            if let Some(hint) = error.retry_after() {
                return hint.min(Duration::from_millis(self.max_delay_ms));
            }
        }

        let exponent = (attempt_number - 2).min(i32::MAX as u32) as i32;
        let base = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);

        let jittered = if self.jitter_factor > 0.0 {
            let half = self.jitter_factor / 2.0;
            let factor = rand::thread_rng().gen_range((1.0 - half)..=(1.0 + half));
            capped * factor
        } else {
            capped
        };

        Duration::from_millis(jittered.max(0.0) as u64)
    }

    /// Whether a failed attempt `attempt_number` should be followed by another
    pub fn should_retry(&self, error: &ProviderError, attempt_number: u32) -> bool {
        attempt_number < self.max_attempts.max(1) && self.retryable.matches(error)
    }
}

/// One invocation of the operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based
    pub attempt_number: u32,

    /// Wait that preceded this attempt
    pub delay_ms: u64,

    /// Failure, if the attempt failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,

    /// Start time, milliseconds since the Unix epoch
    pub timestamp: u64,
}

/// Result of an operation plus every attempt made
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: ProviderResult<T>,
    pub attempts: Vec<RetryAttempt>,
    pub total_delay_ms: u64,
}

/// Counters for one retried operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub attempts: u64,
    pub retries: u64,
    pub total_delay_ms: u64,
}

/// Retry counters keyed by operation name
#[derive(Debug, Default)]
pub struct RetryMetricsRegistry {
    operations: Mutex<HashMap<String, RetryMetrics>>,
}

impl RetryMetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<T>(&self, operation: &str, outcome: &RetryOutcome<T>) {
        let mut operations = self.operations.lock().unwrap_or_else(|e| e.into_inner());
        let metrics = operations.entry(operation.to_string()).or_default();

        let attempts = outcome.attempts.len() as u64;
        metrics.calls += 1;
        metrics.attempts += attempts;
        metrics.retries += attempts.saturating_sub(1);
        metrics.total_delay_ms += outcome.total_delay_ms;
        if outcome.result.is_ok() {
            metrics.successes += 1;
        } else {
            metrics.failures += 1;
        }
    }

    pub fn get(&self, operation: &str) -> Option<RetryMetrics> {
        let operations = self.operations.lock().unwrap_or_else(|e| e.into_inner());
        operations.get(operation).cloned()
    }

    pub fn get_all(&self) -> BTreeMap<String, RetryMetrics> {
        let operations = self.operations.lock().unwrap_or_else(|e| e.into_inner());
        operations
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.clone()))
            .collect()
    }

    pub fn reset_all(&self) {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Executor for retry operations
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    metrics: Option<(String, Arc<RetryMetricsRegistry>)>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            metrics: None,
        }
    }

    /// Report outcomes to a registry under `operation`
    pub fn with_metrics(mut self, operation: impl Into<String>, registry: Arc<RetryMetricsRegistry>) -> Self {
        self.metrics = Some((operation.into(), registry));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the operation, returning its value or the last error
    pub async fn execute<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.execute_with_history(operation).await.result
    }

    /// Run the operation and keep the record of every attempt
    pub async fn execute_with_history<F, Fut, T>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempts = Vec::new();
        let mut total_delay_ms = 0;
        let mut delay = Duration::ZERO;
        let mut attempt_number = 1;

        let result = loop {
            let timestamp = now_ms();
            let result = self.attempt(operation()).await;

            let error = result.as_ref().err().cloned();
            attempts.push(RetryAttempt {
                attempt_number,
                delay_ms: delay.as_millis() as u64,
                error: error.clone(),
                timestamp,
            });

            let Some(error) = error else {
                break result;
            };

            if !self.policy.should_retry(&error, attempt_number) {
                if attempt_number > 1 {
                    debug!(attempts = attempt_number, error = %error, "giving up after retries");
                }
                break result;
            }

            attempt_number += 1;
            delay = self.policy.calculate_delay(attempt_number, &error);
            total_delay_ms += delay.as_millis() as u64;

            warn!(
                attempt = attempt_number,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = error.name(),
                "retrying backend call"
            );
            tokio::time::sleep(delay).await;
        };

        let outcome = RetryOutcome {
            result,
            attempts,
            total_delay_ms,
        };
        if let Some((operation, registry)) = &self.metrics {
            registry.record(operation, &outcome);
        }
        outcome
    }

    async fn attempt<Fut, T>(&self, future: Fut) -> ProviderResult<T>
    where
        Fut: Future<Output = ProviderResult<T>>,
    {
        match self.policy.timeout_ms {
            Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), future)
                .await
                .unwrap_or(Err(ProviderError::Timeout { after_ms })),
            None => future.await,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 100);
        assert_eq!(policy.multiplier, 2.0);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter_factor: 0.0,
            respect_retry_after: false,
            ..Default::default()
        };
        let error = ProviderError::Timeout { after_ms: 5 };

        let delays: Vec<u128> = (2..=6)
            .map(|n| policy.calculate_delay(n, &error).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000]);
        assert_eq!(policy.calculate_delay(1, &error), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            jitter_factor: 0.5,
            ..Default::default()
        };
        let error = ProviderError::Timeout { after_ms: 5 };
        for _ in 0..50 {
            let delay = policy.calculate_delay(2, &error).as_millis();
            assert!((750..=1250).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn test_retry_after_respected() {
        let policy = RetryPolicy::default();
        let error = ProviderError::RateLimit {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(policy.calculate_delay(2, &error).as_secs(), 5);
    }

    #[test]
    fn test_should_retry_logic() {
        let policy = RetryPolicy::new(3);
        let timeout = ProviderError::Timeout { after_ms: 5 };
        assert!(policy.should_retry(&timeout, 1));
        assert!(policy.should_retry(&timeout, 2));
        assert!(!policy.should_retry(&timeout, 3));

        let auth_error = ProviderError::Authentication {
            message: "denied".to_string(),
        };
        assert!(!policy.should_retry(&auth_error, 1));
    }

    #[test]
    fn test_allow_list_matching() {
        let list = RetryableErrors::default();
        assert!(list.matches(&ProviderError::ServerError {
            status_code: 502,
            message: String::new(),
        }));
        assert!(list.matches(&ProviderError::Provider {
            provider: "azure".to_string(),
            code: "x".to_string(),
            message: "socket hang up".to_string(),
        }));
        assert!(!list.matches(&ProviderError::InvalidRequest {
            message: "bad".to_string(),
        }));
        assert!(!RetryableErrors::none().matches(&ProviderError::Network {
            message: "reset".to_string(),
        }));
    }
}
