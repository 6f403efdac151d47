//! Health check endpoint
//!
//! Always answers 200 so load balancers keep routing; `ai_status` reports
//! whether model calls can currently succeed.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// "operational", or "degraded" when no backend is usable or the breaker is open
    pub ai_status: &'static str,
    pub backends: Vec<BackendStatus>,
    pub breaker: BreakerSnapshot,
}

pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let invoker = state.service().invoker();
    let breaker = invoker.breaker_snapshot();
    let backends: Vec<BackendStatus> = invoker
        .pool()
        .slots()
        .iter()
        .map(|slot| BackendStatus {
            name: slot.name().to_string(),
            available: slot.is_available(),
        })
        .collect();

    let ai_status = if invoker.pool().is_empty() || breaker.state == CircuitState::Open {
        "degraded"
    } else {
        "operational"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            ai_status,
            backends,
            breaker,
        }),
    )
}
