//! Onshape Export Gateway
//!
//! Single-binary Rust service that:
//! 1. Signs users in with the CAD provider via three-legged OAuth
//! 2. Issues signed session credentials the browser presents on every call
//! 3. Runs create-then-poll STEP export jobs against the document API
//! 4. Streams finished artifacts back to the panel

mod config;
mod error;
mod extract;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::AppState;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting onshape-export-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        oauth_base_url = %config.onshape.oauth_base_url,
        api_base_url = %config.onshape.api_base_url,
        callback_url = %config.onshape.callback_url,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.upstream_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    // Config::load resolves both secrets or fails, so these are present.
    let client_secret = config
        .onshape
        .client_secret
        .take()
        .context("OAuth client secret missing after config load")?;
    let session_secret = config
        .session
        .secret
        .take()
        .context("session signing secret missing after config load")?;

    let oauth = onshape_auth::OAuthConfig {
        client_id: config.onshape.client_id.clone(),
        client_secret,
        callback_url: config.onshape.callback_url.clone(),
        oauth_base_url: config.onshape.oauth_base_url.clone(),
        api_base_url: config.onshape.api_base_url.clone(),
        scope: config.onshape.scope.clone(),
    };
    let export = onshape_export::ExportClient::new(http.clone(), &config.onshape.api_base_url);

    let app_state = AppState {
        http,
        oauth,
        session_secret,
        session_ttl: Duration::from_secs(config.session.ttl_secs),
        secure_cookies: config.session.secure_cookies,
        export,
        evaluator: Arc::new(compliance::NoopEvaluator),
        prometheus: prometheus_handle,
    };

    let app = routes::build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. We enforce DRAIN_TIMEOUT so a slow client cannot block process exit
    //
    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts. We achieve this by notifying the server to drain, then
    // racing the drain against the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Wait for the OS signal
    shutdown_signal().await;

    // Signal the server to begin draining
    let _ = shutdown_tx.send(());

    // Now enforce the drain timeout — this timer starts at signal receipt
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
