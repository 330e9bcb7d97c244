//! Conversion Server Binary
//!
//! Runs the conversion service behind the HTTP API until Ctrl-C, then drains the worker
//! pool before exiting.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use conversion_core::config::ConfigManager;
use conversion_core::logging::init_structured_logging;
use conversion_core::service::ConversionService;
use conversion_core::web::{self, WebState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load configuration")?;
    let config = manager.config().clone();
    info!(
        environment = %manager.environment(),
        config_file = ?manager.config_file(),
        "Configuration loaded"
    );

    let service = Arc::new(
        ConversionService::from_config(&config).context("failed to start conversion service")?,
    );
    let app = web::router(Arc::new(WebState::new(Arc::clone(&service))));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Conversion server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown signal received");
    service.shutdown().await;
    info!("Conversion server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler there is nothing to wait for
        std::future::pending::<()>().await;
    }
}
