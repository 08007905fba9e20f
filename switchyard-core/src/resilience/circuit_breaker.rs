//! Circuit breaker for backend calls
//!
//! A breaker counts consecutive "expected" failures of one logical backend.
//! Once the threshold is reached it opens and rejects calls without touching
//! the network until the backoff window has passed, then lets a probe through
//! (half-open). The probe's outcome either closes the breaker or reopens it
//! with a longer window.

use crate::providers::{ProviderError, ProviderResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound of the multiplicative jitter applied to each open window
const MAX_JITTER: f64 = 0.1;

/// Breaker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive expected failures that open the breaker
    pub failure_threshold: u32,

    /// First open window, also the floor the window resets to
    pub initial_backoff_ms: u64,

    /// Longest open window
    pub max_backoff_ms: u64,

    /// Growth factor applied to the window each time the breaker opens
    pub backoff_multiplier: f64,

    /// Error names or message fragments that count as failures
    pub expected_errors: Vec<String>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            expected_errors: vec![
                "NetworkError".to_string(),
                "TimeoutError".to_string(),
                "ServerError".to_string(),
                "RateLimitError".to_string(),
                "Service Unavailable".to_string(),
            ],
        }
    }
}

impl CircuitBreakerConfig {
    /// Whether an error counts toward opening the breaker
    pub fn is_expected(&self, error: &ProviderError) -> bool {
        if matches!(error, ProviderError::CircuitOpen { .. }) {
            return false;
        }
        let name = error.name();
        let message = error.to_string();
        self.expected_errors
            .iter()
            .any(|expected| expected == name || message.contains(expected.as_str()))
    }
}

/// Breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub current_backoff_ms: u64,

    /// Time left before a probe is admitted, while open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_in_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    total_calls: u64,
    rejected_calls: u64,
    current_backoff_ms: u64,
    next_attempt_at: Option<Instant>,
    last_failure: Option<String>,
}

impl BreakerState {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_calls: 0,
            rejected_calls: 0,
            current_backoff_ms: config.initial_backoff_ms,
            next_attempt_at: None,
            last_failure: None,
        }
    }
}

/// One named breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = Mutex::new(BreakerState::new(&config));
        Self {
            name: name.into(),
            config,
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run an operation under the breaker
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CircuitOpen` without running the operation when
    /// the breaker is open; otherwise returns the operation's own error.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.admit()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    /// Admission check, moving OPEN to HALF_OPEN once the window has passed
    pub fn admit(&self) -> ProviderResult<()> {
        let mut inner = self.lock();
        inner.total_calls += 1;

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let now = Instant::now();
        match inner.next_attempt_at {
            Some(next) if now < next => {
                inner.rejected_calls += 1;
                let retry_in = next - now;
                debug!(breaker = %self.name, retry_in_ms = retry_in.as_millis() as u64, "circuit open, rejecting call");
                Err(ProviderError::CircuitOpen {
                    breaker: self.name.clone(),
                    retry_in_ms: retry_in.as_millis() as u64,
                    next_attempt_at_ms: epoch_ms_after(retry_in),
                })
            }
            _ => {
                inner.state = CircuitState::HalfOpen;
                info!(breaker = %self.name, "circuit half-open, admitting probe");
                Ok(())
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.success_count += 1;
        inner.current_backoff_ms = self.config.initial_backoff_ms;
        inner.next_attempt_at = None;

        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, from = %inner.state, "circuit closed");
            inner.state = CircuitState::Closed;
        }
    }

    /// Record a failed call; unexpected errors leave the breaker untouched
    pub fn record_failure(&self, error: &ProviderError) {
        if !self.config.is_expected(error) {
            debug!(breaker = %self.name, error = error.name(), "error not counted by circuit breaker");
            return;
        }

        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(error.to_string());

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if should_open {
            self.open(&mut inner);
        }
    }

    fn open(&self, inner: &mut BreakerState) {
        let jitter = rand::thread_rng().gen_range(0.0..MAX_JITTER);
        let window_ms = (inner.current_backoff_ms as f64 * (1.0 + jitter)) as u64;

        inner.state = CircuitState::Open;
        inner.next_attempt_at = Some(Instant::now() + Duration::from_millis(window_ms));

        let grown = (inner.current_backoff_ms as f64 * self.config.backoff_multiplier) as u64;
        inner.current_backoff_ms = grown.min(self.config.max_backoff_ms);

        warn!(
            breaker = %self.name,
            failures = inner.failure_count,
            retry_in_ms = window_ms,
            "circuit opened"
        );
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.lock();
        let now = Instant::now();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            current_backoff_ms: inner.current_backoff_ms,
            next_attempt_in_ms: inner
                .next_attempt_at
                .filter(|_| inner.state == CircuitState::Open)
                .map(|next| next.saturating_duration_since(now).as_millis() as u64),
            last_failure: inner.last_failure.clone(),
        }
    }

    /// Return to a fresh closed state
    pub fn reset(&self) {
        *self.lock() = BreakerState::new(&self.config);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn epoch_ms_after(delay: Duration) -> u64 {
    SystemTime::now()
        .checked_add(delay)
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Breakers keyed by backend name, created on first use
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Breaker for `name`, creating it with the registry's config if needed
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers.get(name).cloned()
    }

    /// Metrics for every breaker, ordered by name
    pub fn get_all_metrics(&self) -> BTreeMap<String, CircuitBreakerMetrics> {
        self.snapshot()
            .into_iter()
            .map(|breaker| (breaker.name().to_string(), breaker.metrics()))
            .collect()
    }

    /// Current state of every breaker
    pub fn states(&self) -> Vec<CircuitState> {
        self.snapshot().iter().map(|breaker| breaker.state()).collect()
    }

    pub fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset();
        }
    }

    // Clones the handles so breaker locks are never taken under the map lock
    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers.values().cloned().collect()
    }
}
