//! In-process TTL cache for model responses
//!
//! Entries expire lazily: `get` evicts an entry whose deadline has passed.
//! There is no background sweeper and no size bound.

use crate::metrics::Metrics;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default entry lifetime (10 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
/// Longest lifetime an entry may have (1 week); larger TTLs are clamped
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// Key-value store whose entries expire after a TTL
///
/// Values are cloned out on `get`, so wrap large payloads in `Arc` if
/// cloning is expensive.
pub struct ResponseCache<T> {
    name: String,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(name: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            default_ttl: default_ttl.min(MAX_TTL),
            entries: Mutex::new(HashMap::new()),
            metrics: None,
        }
    }

    /// Record hits and misses under this cache's name
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key`, replacing any previous entry
    ///
    /// `ttl` of `None` uses the cache default; any TTL is capped at [`MAX_TTL`].
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl).min(MAX_TTL);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Fetch a live entry, evicting it if it has expired
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let found = {
            let mut entries = self.lock();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
                Some(_) => {
                    entries.remove(key);
                    tracing::trace!(cache = %self.name, key = %key, "Evicted expired entry");
                    None
                }
                None => None,
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.cache_lookup(&self.name, found.is_some());
        }
        found
    }

    /// Remove `key`; returns whether an entry (live or expired) was present
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn flush(&self) {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        tracing::debug!(cache = %self.name, entries = count, "Cache flushed");
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build a cache key as `namespace:<hex digest of parts>`
///
/// The digest is stable within one process, which is all an in-memory
/// cache needs.
pub fn cache_key<H: Hash + ?Sized>(namespace: &str, parts: &H) -> String {
    let mut hasher = DefaultHasher::new();
    parts.hash(&mut hasher);
    format!("{}:{:016x}", namespace, hasher.finish())
}
