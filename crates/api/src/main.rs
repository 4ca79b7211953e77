//! Beacon API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use beacon_common::config::AppConfig;
use beacon_notifier::NotificationQueue;

use beacon_api::routes::create_router;
use beacon_api::state::AppState;

/// Enough for a full 10k-URL ping request.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("beacon_api=info,beacon_notifier=info,tower_http=info")
        }))
        .json()
        .init();

    tracing::info!("Starting Beacon API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Build the dispatch queue and its flush timer
    let queue = NotificationQueue::from_config(&config.indexnow)?;
    queue.start();

    let addr: SocketAddr = config.api_bind_addr.parse()?;
    let state = AppState::new(queue.clone(), config);

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the timer and give pending URLs one last chance
    queue.stop();
    let report = queue.flush().await;
    let remaining = queue.status().size;
    if remaining > 0 {
        tracing::warn!(remaining, "Shutting down with undelivered IndexNow URLs");
    } else {
        tracing::info!(delivered = report.delivered, "Final IndexNow flush complete");
    }

    tracing::info!("Beacon API server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
}
