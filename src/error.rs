//! Error types for pmagent
//!
//! `AiError` is what callers of the AI core observe. `AppError` wraps it for the
//! application layer and implements `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Message shown to users when no model produced a usable answer
pub const DEGRADED_SERVICE_MESSAGE: &str =
    "The AI assistant is currently unavailable. Please try again later.";

/// Failures surfaced by the AI core
///
/// Distinguishes the three failure origins a caller can observe:
/// every backend was tried and failed, the breaker refused to try at all,
/// or a model answered but the answer did not satisfy its contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// Every backend in the pool failed, or the pool is empty
    #[error("AI service temporarily unavailable: all {} backend(s) failed", attempted.len())]
    AllBackendsExhausted { attempted: Vec<String> },

    /// Short-circuited by the circuit breaker without contacting any backend
    #[error(
        "Circuit breaker is OPEN: AI service is temporarily unavailable (retry in {}s)",
        retry_after.as_secs()
    )]
    BreakerOpen { retry_after: Duration },

    /// The model responded but its output could not be parsed or validated
    ///
    /// `raw` is the completion exactly as received; `cleaned` is the text that
    /// was handed to the JSON parser.
    #[error("AI output failed contract validation: {reason}")]
    ContractValidation {
        reason: String,
        raw: String,
        cleaned: String,
    },
}

impl AiError {
    /// True for failures where no model output exists (exhaustion or open breaker)
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::AllBackendsExhausted { .. } | Self::BreakerOpen { .. }
        )
    }
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            Self::JobNotFound(_) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": self.to_string() }),
            ),
            Self::Ai(e) if e.is_unavailable() => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "error": DEGRADED_SERVICE_MESSAGE,
                    "details": e.to_string(),
                }),
            ),
            Self::Ai(AiError::ContractValidation {
                reason,
                raw,
                cleaned,
            }) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({
                    "error": format!("AI output validation failed: {}", reason),
                    "raw": raw,
                    "cleaned": cleaned,
                }),
            ),
            Self::Config(msg) | Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": self.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creates() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_validation_error_creates() {
        let err = AppError::Validation("invalid input".to_string());
        assert_eq!(err.to_string(), "Invalid request: invalid input");
    }

    #[test]
    fn test_exhausted_message_is_normalized() {
        let err = AiError::AllBackendsExhausted {
            attempted: vec!["groq".to_string(), "openai".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "AI service temporarily unavailable: all 2 backend(s) failed"
        );
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_breaker_open_distinct_from_exhaustion() {
        let err = AiError::BreakerOpen {
            retry_after: Duration::from_secs(12),
        };
        assert!(err.to_string().starts_with("Circuit breaker is OPEN"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_contract_validation_not_unavailable() {
        let err = AiError::ContractValidation {
            reason: "missing riskLevel".to_string(),
            raw: "raw".to_string(),
            cleaned: "cleaned".to_string(),
        };
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_validation_error_response_status() {
        let response = AppError::Validation("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_job_not_found_response_status() {
        let response = AppError::JobNotFound("abc".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unavailable_response_status() {
        let response = AppError::from(AiError::BreakerOpen {
            retry_after: Duration::from_secs(1),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::from(AiError::AllBackendsExhausted { attempted: vec![] })
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_contract_failure_response_status() {
        let response = AppError::from(AiError::ContractValidation {
            reason: "bad".to_string(),
            raw: String::new(),
            cleaned: String::new(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_error_response_status() {
        let response = AppError::Internal("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
