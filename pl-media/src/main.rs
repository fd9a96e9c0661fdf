//! Media library (pl-media) - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pl_common::config::{socket_addr, TomlConfig};
use pl_common::EventBus;
use pl_media::{build_router, AppState, MediaLibrary};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pl-media
#[derive(Parser, Debug)]
#[command(name = "pl-media")]
#[command(about = "In-memory media library")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5781", env = "PL_MEDIA_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "PL_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Config file (only `bind_addr` and `[logging]` are used)
    #[arg(short, long, env = "PL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "PL_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    // Initialize tracing
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pl_media={level},pl_common={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting pl-media v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    config_source.log();

    let bind_addr = args.bind_addr.clone().unwrap_or_else(|| config.bind_addr_or_default());
    let addr = socket_addr(&bind_addr, args.port)?;

    let library = Arc::new(MediaLibrary::new(Arc::new(EventBus::default())));
    let router = build_router(AppState::new(library));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
