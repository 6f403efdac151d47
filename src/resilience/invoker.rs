//! Resilient completion invoker
//!
//! Composes the backend pool with one circuit breaker: the whole ordered
//! attempt sequence (primary, then each fallback) runs inside a single
//! breaker call, so the breaker counts one failure per exhausted sequence,
//! not one per backend.

use crate::backends::{BackendError, BackendPool, ChatMessage, PooledBackend};
use crate::error::AiError;
use crate::metrics::{CallOutcome, Metrics};
use crate::resilience::breaker::{BreakerError, BreakerSnapshot, CircuitBreaker};
use std::sync::Arc;

/// Produces completions with ordered fallback under a circuit breaker
///
/// Callers only ever see a completion, `AiError::AllBackendsExhausted`, or
/// `AiError::BreakerOpen`; provider-specific errors stay inside.
pub struct ResilientInvoker {
    pool: BackendPool,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl ResilientInvoker {
    pub fn new(pool: BackendPool, breaker: CircuitBreaker, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            breaker,
            metrics,
        }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Get a completion for `messages`
    ///
    /// # Cancellation Safety
    /// Dropping the returned future aborts the in-flight backend call. The
    /// breaker records neither success nor failure for an abandoned call.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        self.breaker
            .execute(|| self.try_backends(messages))
            .await
            .map_err(|e| match e {
                BreakerError::Open { retry_after } => {
                    tracing::warn!(
                        breaker = %self.breaker.name(),
                        retry_after_secs = retry_after.as_secs(),
                        "AI call short-circuited by open breaker"
                    );
                    AiError::BreakerOpen { retry_after }
                }
                BreakerError::Inner(e) => e,
            })
    }

    /// Try every available backend in order until one succeeds
    async fn try_backends(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let total = self.pool.available_count();
        let mut attempted = Vec::with_capacity(total);

        for (index, backend) in self.pool.available().enumerate() {
            let attempt = index + 1;
            attempted.push(backend.name().to_string());

            match self.attempt(backend, messages).await {
                Ok(text) => {
                    self.metrics.backend_call(backend.name(), CallOutcome::Success);
                    if attempt > 1 {
                        tracing::info!(
                            backend = %backend.name(),
                            attempt = attempt,
                            "Fallback backend succeeded"
                        );
                    } else {
                        tracing::debug!(backend = %backend.name(), "Primary backend succeeded");
                    }
                    return Ok(text);
                }
                Err(e) => {
                    let outcome = match e {
                        BackendError::Timeout { .. } => CallOutcome::Timeout,
                        _ => CallOutcome::Failure,
                    };
                    self.metrics.backend_call(backend.name(), outcome);
                    tracing::warn!(
                        backend = %backend.name(),
                        attempt = attempt,
                        total = total,
                        error = %e,
                        "Backend call failed, trying next backend"
                    );
                }
            }
        }

        if attempted.is_empty() {
            tracing::error!(
                configured = self.pool.slots().len(),
                "No AI backend available. Check backend credentials."
            );
        } else {
            tracing::error!(
                attempted = ?attempted,
                "All AI backends failed"
            );
        }
        Err(AiError::AllBackendsExhausted { attempted })
    }

    /// One bounded call to one backend
    async fn attempt(
        &self,
        backend: &PooledBackend,
        messages: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let timeout = backend.timeout();
        tokio::time::timeout(timeout, backend.backend().complete(messages))
            .await
            .map_err(|_elapsed| BackendError::Timeout { timeout })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::CompletionBackend;
    use crate::resilience::breaker::CircuitState;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that answers from a fixed script and logs call order
    struct ScriptedBackend {
        name: &'static str,
        reply: Option<&'static str>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
            self.log.lock().unwrap().push(self.name);
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(BackendError::Status {
                    status: 503,
                    body: "overloaded".to_string(),
                }),
            }
        }
    }

    /// Backend that never answers
    struct HangingBackend;

    #[async_trait]
    impl CompletionBackend for HangingBackend {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
            std::future::pending().await
        }
    }

    fn scripted(
        specs: &[(&'static str, Option<&'static str>)],
    ) -> (BackendPool, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = BackendPool::from_backends(specs.iter().map(|(name, reply)| {
            PooledBackend::new(
                Arc::new(ScriptedBackend {
                    name,
                    reply: *reply,
                    log: log.clone(),
                }),
                Duration::from_secs(5),
            )
        }));
        (pool, log)
    }

    fn invoker(pool: BackendPool, threshold: u32) -> (ResilientInvoker, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let breaker = CircuitBreaker::new("completion", threshold, Duration::from_secs(30))
            .with_metrics(metrics.clone());
        (
            ResilientInvoker::new(pool, breaker, metrics.clone()),
            metrics,
        )
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("status?")]
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let (pool, log) = scripted(&[("primary", Some("A")), ("fallback", Some("B"))]);
        let (invoker, _) = invoker(pool, 3);

        assert_eq!(invoker.complete(&messages()).await.unwrap(), "A");
        assert_eq!(*log.lock().unwrap(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_failure() {
        let (pool, log) = scripted(&[("primary", None), ("fallback", Some("B"))]);
        let (invoker, metrics) = invoker(pool, 3);

        assert_eq!(invoker.complete(&messages()).await.unwrap(), "B");
        assert_eq!(*log.lock().unwrap(), vec!["primary", "fallback"]);
        assert_eq!(invoker.breaker_snapshot().consecutive_failures, 0);
        assert_eq!(metrics.backend_calls_count("primary", CallOutcome::Failure), 1);
        assert_eq!(metrics.backend_calls_count("fallback", CallOutcome::Success), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_counts_once() {
        let (pool, log) = scripted(&[("primary", None), ("fallback", None)]);
        let (invoker, _) = invoker(pool, 3);

        let err = invoker.complete(&messages()).await.unwrap_err();
        assert_eq!(
            err,
            AiError::AllBackendsExhausted {
                attempted: vec!["primary".to_string(), "fallback".to_string()]
            }
        );
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(invoker.breaker_snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_empty_pool_fails_fast() {
        let (invoker, _) = invoker(BackendPool::default(), 3);
        let err = invoker.complete(&messages()).await.unwrap_err();
        assert_eq!(err, AiError::AllBackendsExhausted { attempted: vec![] });
    }

    #[tokio::test]
    async fn test_open_breaker_skips_backends() {
        let (pool, log) = scripted(&[("primary", None)]);
        let (invoker, metrics) = invoker(pool, 2);

        let _ = invoker.complete(&messages()).await;
        let _ = invoker.complete(&messages()).await;
        assert_eq!(invoker.breaker().state(), CircuitState::Open);

        let err = invoker.complete(&messages()).await.unwrap_err();
        assert!(matches!(err, AiError::BreakerOpen { .. }));
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(metrics.breaker_rejections_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_triggers_fallback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = BackendPool::from_backends([
            PooledBackend::new(Arc::new(HangingBackend), Duration::from_secs(2)),
            PooledBackend::new(
                Arc::new(ScriptedBackend {
                    name: "fallback",
                    reply: Some("late but fine"),
                    log: log.clone(),
                }),
                Duration::from_secs(2),
            ),
        ]);
        let (invoker, metrics) = invoker(pool, 3);

        assert_eq!(
            invoker.complete(&messages()).await.unwrap(),
            "late but fine"
        );
        assert_eq!(metrics.backend_calls_count("hanging", CallOutcome::Timeout), 1);
    }
}
