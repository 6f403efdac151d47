//! Configuration management for pmagent
//!
//! Parses TOML configuration files, applies environment overrides, and
//! provides typed access to settings.

use crate::cache::MAX_TTL;
use crate::error::{AppError, AppResult};
use crate::resilience::breaker::MAX_COOLDOWN;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for any per-call timeout, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;
/// Upper bound for job retention and the sweep interval (1 week)
const MAX_JOB_WINDOW_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Environment variable overriding the model name of every backend
pub const ENV_MODEL: &str = "PMAGENT_MODEL";
/// Environment variable overriding `cache.default_ttl_seconds`
pub const ENV_CACHE_TTL: &str = "PMAGENT_CACHE_TTL_SECONDS";
/// Environment variable overriding `breaker.failure_threshold`
pub const ENV_BREAKER_THRESHOLD: &str = "PMAGENT_BREAKER_THRESHOLD";
/// Environment variable overriding `breaker.cooldown_seconds`
pub const ENV_BREAKER_COOLDOWN: &str = "PMAGENT_BREAKER_COOLDOWN_SECONDS";
/// Environment variable overriding `jobs.retention_seconds`
pub const ENV_JOB_RETENTION: &str = "PMAGENT_JOB_RETENTION_SECONDS";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Model backends in priority order (first entry is the primary)
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// One model backend: provider endpoint, model name and credential slot
///
/// All fields are private to enforce invariants. Configuration is loaded via
/// deserialization and validated via Config::validate(). The API key itself is
/// never part of the configuration; `api_key_env` names the environment
/// variable holding it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    name: String,
    base_url: String,
    model: String,
    api_key_env: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f64,
    /// Per-backend override of `llm.request_timeout_seconds`
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl BackendConfig {
    /// Get the backend label used in logs and metrics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the API base URL (e.g. `https://api.groq.com/openai/v1`)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model identifier sent to the provider
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the name of the environment variable holding the API key
    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Get the per-backend timeout override, if configured
    pub fn timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.3
}

/// Settings shared by every model call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// Circuit breaker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown() -> u64 {
    30
}

/// Response cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_seconds: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    600
}

/// Background job settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl JobsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_seconds: default_retention(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_retention() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    60 * 60
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let mut config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        // Phase 3: Environment overrides, then validation of the merged result
        config
            .apply_env_overrides()
            .and_then(|_| config.validate())
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Apply `PMAGENT_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> AppResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Empty values are ignored. Values that fail to parse are configuration
    /// errors rather than silently falling back to the file value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(ENV_MODEL) {
            tracing::info!(model = %model, "Overriding model name for all backends");
            for backend in &mut self.backends {
                backend.model = model.trim().to_string();
            }
        }
        if let Some(v) = get(ENV_CACHE_TTL) {
            self.cache.default_ttl_seconds = parse_override(ENV_CACHE_TTL, &v)?;
        }
        if let Some(v) = get(ENV_BREAKER_THRESHOLD) {
            self.breaker.failure_threshold = parse_override(ENV_BREAKER_THRESHOLD, &v)?;
        }
        if let Some(v) = get(ENV_BREAKER_COOLDOWN) {
            self.breaker.cooldown_seconds = parse_override(ENV_BREAKER_COOLDOWN, &v)?;
        }
        if let Some(v) = get(ENV_JOB_RETENTION) {
            self.jobs.retention_seconds = parse_override(ENV_JOB_RETENTION, &v)?;
        }
        Ok(())
    }

    /// Get the call timeout for a backend
    ///
    /// Returns the backend's own `timeout_seconds` if configured, otherwise
    /// the global `llm.request_timeout_seconds`.
    pub fn timeout_for_backend(&self, backend: &BackendConfig) -> Duration {
        let seconds = match backend.timeout_seconds {
            Some(timeout) => {
                tracing::debug!(
                    backend = %backend.name,
                    timeout_seconds = timeout,
                    "Using backend-specific timeout override"
                );
                timeout
            }
            None => self.llm.request_timeout_seconds,
        };
        Duration::from_secs(seconds)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if backend.name.trim().is_empty() {
                return Err(AppError::Config(
                    "Backend name must not be empty".to_string(),
                ));
            }
            if !seen.insert(backend.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Backend name '{}' is declared more than once. \
                    Names label metrics and logs and must be unique.",
                    backend.name
                )));
            }
            if !backend.base_url.starts_with("http://") && !backend.base_url.starts_with("https://")
            {
                return Err(AppError::Config(format!(
                    "Backend '{}' has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    backend.name, backend.base_url
                )));
            }
            if backend.model.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Backend '{}' has an empty model name",
                    backend.name
                )));
            }
            if backend.api_key_env.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Backend '{}' has an empty api_key_env. \
                    Name the environment variable that holds its API key.",
                    backend.name
                )));
            }
            if backend.max_tokens == 0 {
                return Err(AppError::Config(format!(
                    "Backend '{}' has max_tokens=0. max_tokens must be greater than 0.",
                    backend.name
                )));
            }
            if !(0.0..=2.0).contains(&backend.temperature) {
                return Err(AppError::Config(format!(
                    "Backend '{}' has invalid temperature {}. \
                    temperature must be a finite number between 0.0 and 2.0.",
                    backend.name, backend.temperature
                )));
            }
            if let Some(timeout) = backend.timeout_seconds {
                validate_timeout(&format!("backends.{}.timeout_seconds", backend.name), timeout)?;
            }
        }

        if self.backends.is_empty() {
            tracing::warn!(
                "No [[backends]] configured. Every AI request will fail as service unavailable."
            );
        }

        validate_timeout("llm.request_timeout_seconds", self.llm.request_timeout_seconds)?;

        if self.breaker.failure_threshold == 0 {
            return Err(AppError::Config(
                "breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }
        validate_window(
            "breaker.cooldown_seconds",
            self.breaker.cooldown_seconds,
            MAX_COOLDOWN.as_secs(),
        )?;
        validate_window(
            "cache.default_ttl_seconds",
            self.cache.default_ttl_seconds,
            MAX_TTL.as_secs(),
        )?;
        validate_window(
            "jobs.retention_seconds",
            self.jobs.retention_seconds,
            MAX_JOB_WINDOW_SECONDS,
        )?;
        validate_window(
            "jobs.sweep_interval_seconds",
            self.jobs.sweep_interval_seconds,
            MAX_JOB_WINDOW_SECONDS,
        )?;

        Ok(())
    }
}

fn validate_timeout(field: &str, timeout: u64) -> AppResult<()> {
    validate_window(field, timeout, MAX_TIMEOUT_SECONDS)
}

/// A duration in seconds must lie in `1..=max`
fn validate_window(field: &str, seconds: u64, max: u64) -> AppResult<()> {
    if seconds == 0 {
        return Err(AppError::Config(format!(
            "{} must be greater than 0, got {}",
            field, seconds
        )));
    }
    if seconds > max {
        return Err(AppError::Config(format!(
            "{} cannot exceed {} seconds, got {}",
            field, max, seconds
        )));
    }
    Ok(())
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::Config(format!(
            "Environment override {}='{}' is not a valid number",
            key, value
        ))
    })
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
