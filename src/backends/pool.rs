//! Ordered pool of completion backends
//!
//! Each configured backend is constructed independently from its own
//! credential. A backend whose credential is missing, or whose construction
//! fails, is recorded as unavailable instead of failing the whole pool.
//! The pool never retries anything itself; attempt ordering belongs to the
//! invoker.

use crate::backends::client::{CompletionBackend, OpenAiBackend};
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;

/// An available backend together with its per-attempt time bound
#[derive(Clone)]
pub struct PooledBackend {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl PooledBackend {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One configured slot of the pool, in priority order
#[derive(Clone)]
pub enum BackendSlot {
    Available(PooledBackend),
    Unavailable { name: String, reason: String },
}

impl BackendSlot {
    pub fn name(&self) -> &str {
        match self {
            Self::Available(b) => b.name(),
            Self::Unavailable { name, .. } => name,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Backends for the "chat completion" capability, primary first
#[derive(Clone, Default)]
pub struct BackendPool {
    slots: Vec<BackendSlot>,
}

impl BackendPool {
    /// Build the pool from configuration, reading credentials from the process environment
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with(config, |key| std::env::var(key).ok(), reqwest::Client::new())
    }

    /// Build the pool from configuration with an explicit credential lookup
    ///
    /// All backends share one HTTP client (and thus one connection pool).
    pub fn from_config_with<F>(config: &Config, lookup: F, client: reqwest::Client) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut slots = Vec::with_capacity(config.backends.len());

        for backend_config in &config.backends {
            let name = backend_config.name().to_string();

            let Some(api_key) = lookup(backend_config.api_key_env())
                .filter(|key| !key.trim().is_empty())
            else {
                tracing::warn!(
                    backend = %name,
                    env_var = %backend_config.api_key_env(),
                    "No credential found, backend unavailable"
                );
                slots.push(BackendSlot::Unavailable {
                    name,
                    reason: format!("{} is not set", backend_config.api_key_env()),
                });
                continue;
            };

            match OpenAiBackend::new(backend_config, &api_key, client.clone()) {
                Ok(backend) => {
                    let timeout = config.timeout_for_backend(backend_config);
                    tracing::info!(
                        backend = %name,
                        model = %backend.model(),
                        timeout_seconds = timeout.as_secs(),
                        "Backend available"
                    );
                    slots.push(BackendSlot::Available(PooledBackend::new(
                        Arc::new(backend),
                        timeout,
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %name,
                        error = %e,
                        "Backend construction failed, backend unavailable"
                    );
                    slots.push(BackendSlot::Unavailable {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let pool = Self { slots };
        tracing::info!(
            configured = pool.slots.len(),
            available = pool.available_count(),
            "Backend pool initialized"
        );
        pool
    }

    /// Build a pool from already-constructed backends, all available
    pub fn from_backends<I>(backends: I) -> Self
    where
        I: IntoIterator<Item = PooledBackend>,
    {
        Self {
            slots: backends.into_iter().map(BackendSlot::Available).collect(),
        }
    }

    /// Available backends in priority order
    pub fn available(&self) -> impl Iterator<Item = &PooledBackend> {
        self.slots.iter().filter_map(|slot| match slot {
            BackendSlot::Available(b) => Some(b),
            BackendSlot::Unavailable { .. } => None,
        })
    }

    pub fn available_count(&self) -> usize {
        self.available().count()
    }

    /// True when no backend can be called
    pub fn is_empty(&self) -> bool {
        self.available_count() == 0
    }

    /// All configured slots, including unavailable ones
    pub fn slots(&self) -> &[BackendSlot] {
        &self.slots
    }
}
