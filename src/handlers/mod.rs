//! HTTP request handlers for the pmagent API

use crate::config::Config;
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::service::AiService;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod analyze;
pub mod chat;
pub mod extract;
pub mod health;
pub mod jobs;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    service: Arc<AiService>,
}

impl AppState {
    /// Build the AI service (backend pool, breaker, caches, jobs) from configuration
    pub fn new(config: Arc<Config>, metrics: Arc<Metrics>) -> Self {
        let service = Arc::new(AiService::from_config(&config, metrics));
        Self { config, service }
    }

    pub fn with_service(config: Arc<Config>, service: Arc<AiService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<AiService> {
        &self.service
    }

    pub fn metrics(&self) -> &Metrics {
        self.service.metrics()
    }
}

/// All routes with request-id and trace layers applied
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/ai/analyze", post(analyze::handler))
        .route("/ai/chat", post(chat::handler))
        .route("/ai/doc-to-tasks", post(extract::handler))
        .route("/ai/doc-to-tasks/jobs", post(extract::submit_handler))
        .route("/ai/jobs/{id}", get(jobs::handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
