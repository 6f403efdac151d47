//! Prometheus metrics endpoint

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Metrics in Prometheus text format, or 500 if encoding fails
///
/// ```bash
/// curl http://localhost:5000/metrics
/// # HELP pmagent_backend_calls_total Total model backend calls by backend and outcome
/// # TYPE pmagent_backend_calls_total counter
/// pmagent_backend_calls_total{backend="groq",outcome="success"} 42
/// ```
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for Prometheus scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}
