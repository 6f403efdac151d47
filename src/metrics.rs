//! Prometheus metrics collection for pmagent
//!
//! This module provides metrics instrumentation for tracking:
//! - Backend calls by backend and outcome
//! - Circuit breaker rejections and openings
//! - Response cache hits and misses
//! - Background job lifecycle events
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Outcome of one backend attempt, for type-safe metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Background job lifecycle event, for type-safe metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Submitted,
    Completed,
    Failed,
}

impl JobEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Metrics collector for pmagent
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    backend_calls: IntCounterVec,
    breaker_rejections: IntCounter,
    breaker_opened: IntCounter,
    cache_lookups: IntCounterVec,
    jobs: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: N backends × 3 outcomes
        let backend_calls = IntCounterVec::new(
            Opts::new(
                "pmagent_backend_calls_total",
                "Total model backend calls by backend and outcome",
            ),
            &["backend", "outcome"],
        )?;

        let breaker_rejections = IntCounter::with_opts(Opts::new(
            "pmagent_breaker_rejections_total",
            "Calls short-circuited by an open circuit breaker without contacting any backend",
        ))?;

        let breaker_opened = IntCounter::with_opts(Opts::new(
            "pmagent_breaker_opened_total",
            "Number of CLOSED/HALF_OPEN to OPEN transitions",
        ))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new(
                "pmagent_cache_lookups_total",
                "Response cache lookups by cache and result (hit, miss)",
            ),
            &["cache", "result"],
        )?;

        let jobs = IntCounterVec::new(
            Opts::new(
                "pmagent_jobs_total",
                "Background job lifecycle events (submitted, completed, failed)",
            ),
            &["status"],
        )?;

        registry.register(Box::new(backend_calls.clone()))?;
        registry.register(Box::new(breaker_rejections.clone()))?;
        registry.register(Box::new(breaker_opened.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(jobs.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            backend_calls,
            breaker_rejections,
            breaker_opened,
            cache_lookups,
            jobs,
        })
    }

    /// Record one backend attempt
    pub fn backend_call(&self, backend: &str, outcome: CallOutcome) {
        self.backend_calls
            .with_label_values(&[backend, outcome.as_str()])
            .inc();
    }

    pub fn backend_calls_count(&self, backend: &str, outcome: CallOutcome) -> u64 {
        self.backend_calls
            .with_label_values(&[backend, outcome.as_str()])
            .get()
    }

    pub fn breaker_rejected(&self) {
        self.breaker_rejections.inc();
    }

    pub fn breaker_rejections_count(&self) -> u64 {
        self.breaker_rejections.get()
    }

    pub fn breaker_opened(&self) {
        self.breaker_opened.inc();
    }

    pub fn breaker_opened_count(&self) -> u64 {
        self.breaker_opened.get()
    }

    /// Record a cache lookup for the named cache
    pub fn cache_lookup(&self, cache: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[cache, result]).inc();
    }

    pub fn cache_lookups_count(&self, cache: &str, hit: bool) -> u64 {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[cache, result]).get()
    }

    pub fn job_event(&self, event: JobEvent) {
        self.jobs.with_label_values(&[event.as_str()]).inc();
    }

    pub fn job_events_count(&self, event: JobEvent) -> u64 {
        self.jobs.with_label_values(&[event.as_str()]).get()
    }

    /// Gather all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(
                invalid_byte_index = e.utf8_error().valid_up_to(),
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}
