//! pmagent - resilient LLM invocation for AI-assisted project management
//!
//! Calls OpenAI-compatible model backends in priority order behind a
//! circuit breaker, validates model output against typed contracts,
//! caches results, and runs long extractions as pollable background jobs.

pub mod backends;
pub mod cache;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod project;
pub mod resilience;
pub mod service;
pub mod telemetry;
