//! Partner list service (pl-partners) - Main entry point
//!
//! Resolves configuration (command line > environment > config file >
//! compiled defaults), connects the collaborators and serves the JSON API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pl_common::backend::Backend;
use pl_common::config::{public_base_url, socket_addr, BackendKind, BackendOverrides, TomlConfig};
use pl_common::EventBus;
use pl_partners::{build_router, AppState, PartnerApp, PartnerSettings};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pl-partners
#[derive(Parser, Debug)]
#[command(name = "pl-partners")]
#[command(about = "Partner list service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PL_PARTNERS_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PL_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Base URL clients use to reach this process (local storage addresses)
    #[arg(long, env = "PL_PUBLIC_BASE")]
    public_base: Option<String>,

    /// Config file (defaults to the platform location)
    #[arg(short, long, env = "PL_CONFIG")]
    config: Option<PathBuf>,

    /// Backend: "supabase" or "local"
    #[arg(long, env = "PL_BACKEND")]
    backend: Option<BackendKind>,

    /// Hosted project URL
    #[arg(long, env = "PL_SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Hosted project anon key
    #[arg(long, env = "PL_SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_anon_key: Option<String>,

    /// Local backend data directory
    #[arg(long, env = "PL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "PL_LOG_LEVEL")]
    log_level: Option<String>,
}

const DEFAULT_PORT: u16 = 5780;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    // Initialize tracing
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pl_partners={level},pl_common={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting pl-partners v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    config_source.log();

    let bind_addr = args.bind_addr.clone().unwrap_or_else(|| config.bind_addr_or_default());
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr = socket_addr(&bind_addr, port)?;

    let backend_config = config.backend.clone().with_overrides(BackendOverrides {
        kind: args.backend,
        url: args.supabase_url,
        anon_key: args.supabase_anon_key,
        data_dir: args.data_dir,
    });

    let public_base = public_base_url(
        args.public_base.as_deref().or(config.public_base.as_deref()),
        addr,
    );
    let backend = Backend::from_config(&backend_config, &public_base)
        .await
        .context("Failed to initialize backend")?;

    let storage_dir = match backend_config.kind {
        BackendKind::Local => Some(backend_config.data_dir().join("storage")),
        BackendKind::Supabase => None,
    };

    let app = Arc::new(PartnerApp::new(
        backend,
        &PartnerSettings::from(&backend_config),
        Arc::new(EventBus::default()),
    ));
    let router = build_router(AppState::new(app.clone(), storage_dir));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Session lookup and first fetch run while requests are served, so
    // /api/session reports `loading` until they finish
    tokio::spawn(async move { app.start().await });

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
