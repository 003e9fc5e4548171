mod config;
mod errors;
mod metrics;
mod retry;
mod routes;

use anyhow::{Context, Result};
use extract::{AnthropicClient, Analyzer, GenerationSettings};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat};
use crate::metrics::{Metrics, TimedGenerator};
use crate::retry::{RetryPolicy, RetryingGenerator};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the process environment still applies.
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    let generation = &config.generation;
    if generation.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; every analysis request will fail");
    }

    let client = AnthropicClient::new(
        generation.api_url.clone(),
        generation.api_key.clone(),
        generation.api_version.clone(),
    );
    let generation_configured = client.has_api_key();

    let policy = RetryPolicy::from(&config.retry);
    info!(
        model = %generation.model,
        max_tokens = generation.max_tokens,
        timeout_secs = generation.request_timeout_secs,
        max_retries = policy.max_retries(),
        "Generation client configured"
    );

    let metrics = Metrics::new();
    // Timing sits outside the retries
    let generator = TimedGenerator::new(RetryingGenerator::new(client, policy), metrics.clone());
    let analyzer = Analyzer::new(
        Arc::new(generator),
        GenerationSettings {
            model: generation.model.clone(),
            max_tokens: generation.max_tokens,
            timeout: generation.request_timeout(),
        },
    );

    let state = Arc::new(AppState {
        analyzer,
        metrics,
        generation_configured,
    });

    let app = routes::router(state, routes::cors_layer(&config.server)?);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
