//! pmagent HTTP server
//!
//! Loads configuration, builds the AI service, starts the job retention
//! sweep and serves the API with Axum.

use clap::Parser;
use pmagent::{
    cli::{self, Cli, Command},
    config::Config,
    handlers::{self, AppState},
    metrics::Metrics,
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = cli::generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config = Config::from_file(&cli.config)?;
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        config = %cli.config,
        backends = config.backends.len(),
        "Starting pmagent server on {}:{}",
        config.server.host,
        config.server.port
    );

    let metrics = Arc::new(Metrics::new()?);
    let config = Arc::new(config);
    let state = AppState::new(config.clone(), metrics);

    if state.service().invoker().pool().is_empty() {
        tracing::warn!(
            "No AI backend has a credential. AI endpoints will answer with a \
            degraded-service error until one is configured."
        );
    }

    state.service().jobs().clone().start_retention_sweep();

    let app = handlers::router(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
