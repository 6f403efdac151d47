//! Command-line interface for pmagent
//!
//! Provides argument parsing and subcommand handling for the pmagent binary.

use clap::{Parser, Subcommand};

/// Resilient AI backend for project management
#[derive(Parser)]
#[command(name = "pmagent")]
#[command(version)]
#[command(about = "Resilient AI backend for project management")]
#[command(
    long_about = "pmagent serves project analysis, chat and document-to-task extraction \
    over HTTP, calling OpenAI-compatible model providers in priority order behind a \
    circuit breaker."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# pmagent Configuration
# =====================
#
# HTTP server, model backends, resilience and caching settings.
# API keys are never stored here: each backend names the environment
# variable that holds its key.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"
port = 5000

# ─────────────────────────────────────────────────────────────────────────────
# MODEL BACKENDS
# ─────────────────────────────────────────────────────────────────────────────
#
# Tried in the order listed: the first entry is the primary, each following
# entry is a fallback used only when the ones before it fail.
# A backend whose api_key_env variable is unset or empty is skipped.
#
# Fields:
#   - name: Label used in logs and metrics (must be unique)
#   - base_url: OpenAI-compatible API base URL (…/v1)
#   - model: Model identifier sent with each request
#   - api_key_env: Environment variable holding the API key
#   - max_tokens: Maximum tokens for generation
#   - temperature: Sampling temperature (0.0-2.0)
#   - timeout_seconds: Per-call timeout (optional, defaults to [llm])

[[backends]]
name = "groq"
base_url = "https://api.groq.com/openai/v1"
model = "llama-3.1-8b-instant"
api_key_env = "GROQ_API_KEY"
max_tokens = 2048
temperature = 0.3

[[backends]]
name = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
max_tokens = 2048
temperature = 0.3
timeout_seconds = 45

# ─────────────────────────────────────────────────────────────────────────────
# RESILIENCE
# ─────────────────────────────────────────────────────────────────────────────

[llm]
# Default per-call timeout in seconds (1-300)
request_timeout_seconds = 30

[breaker]
# Consecutive failed calls (all backends exhausted) before the circuit opens
failure_threshold = 3
# Seconds the circuit stays open before one trial call is allowed
cooldown_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# CACHE AND JOBS
# ─────────────────────────────────────────────────────────────────────────────

[cache]
# Lifetime of cached analysis and extraction results
default_ttl_seconds = 600

[jobs]
# Background job records older than this are deleted, whatever their status
retention_seconds = 1800
# How often the retention sweep runs
sweep_interval_seconds = 3600

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# trace, debug, info, warn, error (RUST_LOG overrides this)
log_level = "info"

# Environment overrides:
#   PMAGENT_MODEL                     model for every backend
#   PMAGENT_CACHE_TTL_SECONDS         [cache] default_ttl_seconds
#   PMAGENT_BREAKER_THRESHOLD         [breaker] failure_threshold
#   PMAGENT_BREAKER_COOLDOWN_SECONDS  [breaker] cooldown_seconds
#   PMAGENT_JOB_RETENTION_SECONDS     [jobs] retention_seconds
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["pmagent"]);
        assert_eq!(cli.config, "config.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["pmagent", "--config", "custom.toml"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["pmagent", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn template_is_a_valid_config() {
        let config: Config = generate_config_template()
            .parse()
            .expect("template should parse and validate");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].name(), "groq");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.breaker.failure_threshold, 3);
    }
}
