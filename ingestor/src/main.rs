mod auth;
mod bigquery;
mod clock;
mod config;
mod credentials;
mod errors;
mod gcs;
mod metrics;
mod model;
mod rest;
mod validate;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env().context("Failed to load configuration")?;

    info!("Starting field ingest gateway");
    info!("HTTP server: {}", config.http_addr);
    info!("Telemetry table: {}", config.table);
    info!("Image bucket: {}", config.bucket);
    info!(
        "Credentials: {}",
        if config.access_token.is_some() { "static token" } else { "metadata server" }
    );

    metrics::init_metrics().context("Failed to register metrics")?;

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let credentials =
        credentials::AccessTokenSource::new(config.access_token.clone(), config.metadata_token_url.clone());

    let state = rest::AppState {
        telemetry: Arc::new(bigquery::BigQueryClient::new(
            http.clone(),
            &config.bigquery_endpoint,
            credentials.clone(),
        )),
        objects: Arc::new(gcs::GcsClient::new(http, &config.gcs_endpoint, credentials)),
        clock: Arc::new(clock::SystemClock),
        config: Arc::new(config),
    };
    let http_addr = state.config.http_addr.clone();

    // Build HTTP app with the ingest endpoint and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", http_addr))?;

    info!("HTTP server listening on {}", http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> Result<String, rest::AppError> {
    Ok(metrics::gather_metrics()?)
}
