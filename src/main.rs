use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use express_guard::config::AppConfig;
use express_guard::observability::{LogRecord, Logger};
use express_guard::{routes, AppState};
use mimalloc::MiMalloc;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// How long shutdown waits for shipped logs to drain.
const LOG_FLUSH_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let default_filter = if config.debug {
        "express_guard=debug,tower_http=debug"
    } else {
        "express_guard=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let logger = Logger::from_config(&config);
    let addr = config.bind_address();

    logger.emit(
        LogRecord::info("startup")
            .message("Gateway starting up")
            .field(
                "settings",
                json!({
                    "project_name": config.project_name,
                    "version": config.version,
                    "debug": config.debug,
                    "api_prefix": config.api_prefix,
                }),
            ),
    );

    let state = AppState::new(config, logger.clone());
    let app = routes::build_router(state).context("Failed to build router")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(host = %addr, "Starting Express security gateway");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    logger.emit(LogRecord::info("shutdown").message("Gateway shutting down"));
    logger.shutdown(LOG_FLUSH_GRACE).await;

    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
