//! Circuit breaker guarding one logical operation
//!
//! # States
//! - Closed: calls pass through; consecutive failures are counted
//! - Open: calls fail fast without running the operation
//! - HalfOpen: one trial call decides between Closed and Open
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive_failures >= threshold
//! Open     → HalfOpen: first call at or after next_attempt
//! HalfOpen → Closed:   trial call succeeds (counter reset to 0)
//! HalfOpen → Open:     trial call fails (fresh next_attempt)
//! ```
//!
//! State lives in process memory. Each breaker guards exactly one logical
//! operation; independent operations need independent breakers.

use crate::metrics::Metrics;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default number of consecutive failures that opens the circuit
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default time the circuit stays open before a trial call is allowed
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);
/// Longest cooldown a breaker will honor (1 day); larger values are clamped
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Breaker mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Error returned by `CircuitBreaker::execute`
///
/// `Inner` carries the operation's own error untouched; `Open` is the
/// breaker's synthetic short-circuit error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open (retry in {}s)", retry_after.as_secs())]
    Open { retry_after: Duration },

    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of a breaker, for health reporting and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Time left until a trial call is allowed (only while open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    next_attempt: Instant,
    probe_in_flight: bool,
}

/// Failure-counting gate with cooldown
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    /// Create a closed breaker
    ///
    /// A threshold of 0 is treated as 1, and `cooldown` is capped at
    /// [`MAX_COOLDOWN`].
    pub fn new(name: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown: cooldown.min(MAX_COOLDOWN),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                next_attempt: Instant::now(),
                probe_in_flight: false,
            }),
            metrics: None,
        }
    }

    /// Record rejections and openings in the given metrics
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_after = (inner.state == CircuitState::Open)
            .then(|| inner.next_attempt.saturating_duration_since(Instant::now()));
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            retry_after,
        }
    }

    /// Run `operation` through the breaker
    ///
    /// Success values and operation errors are passed through unchanged.
    /// While open (and during another caller's half-open trial) the operation
    /// is not invoked and `BreakerError::Open` is returned instead.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let is_probe = self.admit::<E>().inspect_err(|_| {
            if let Some(metrics) = &self.metrics {
                metrics.breaker_rejected();
            }
        })?;
        // Clears the trial flag even if this future is dropped mid-call
        let _probe = ProbeGuard {
            breaker: self,
            armed: is_probe,
        };

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Decide whether a call may proceed; returns whether it is the half-open trial
    fn admit<E>(&self) -> Result<bool, BreakerError<E>> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open if now >= inner.next_attempt => {
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                tracing::info!(
                    breaker = %self.name,
                    "Cooldown elapsed, circuit HALF_OPEN; allowing trial call"
                );
                Ok(true)
            }
            CircuitState::Open => {
                let retry_after = inner.next_attempt.saturating_duration_since(now);
                tracing::debug!(
                    breaker = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit OPEN, rejecting call"
                );
                Err(BreakerError::Open { retry_after })
            }
            CircuitState::HalfOpen if inner.probe_in_flight => {
                tracing::debug!(
                    breaker = %self.name,
                    "Trial call in flight, rejecting concurrent call"
                );
                Err(BreakerError::Open {
                    retry_after: Duration::ZERO,
                })
            }
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Ok(true)
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(
                breaker = %self.name,
                previous_failures = inner.consecutive_failures,
                "Trial call succeeded, circuit CLOSED"
            );
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold;

        if should_open {
            inner.state = CircuitState::Open;
            inner.next_attempt = Instant::now() + self.cooldown;
            tracing::warn!(
                breaker = %self.name,
                consecutive_failures = inner.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Threshold reached, circuit OPEN"
            );
            if let Some(metrics) = &self.metrics {
                metrics.breaker_opened();
            }
        } else {
            tracing::debug!(
                breaker = %self.name,
                consecutive_failures = inner.consecutive_failures,
                threshold = self.failure_threshold,
                "Failure recorded (circuit still CLOSED)"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // State is plain data updated in single assignments; a panic elsewhere
        // cannot leave it half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("default", DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}
