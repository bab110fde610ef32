//! lexline-hooks - telephony webhook ingestion service
//!
//! Configuration: command line, then environment, then TOML file, then
//! defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lexline_common::config::{self, ConfigOverrides, ServiceConfig};
use lexline_hooks::services::IntakeExtractor;
use lexline_hooks::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lexline-hooks")]
#[command(about = "Telephony webhook ingestion for LexLine")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Shared webhook signing secret
    #[arg(long)]
    webhook_secret: Option<String>,

    /// API key for LLM-assisted intake extraction
    #[arg(long)]
    llm_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexline_hooks=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting LexLine webhook ingestion (lexline-hooks) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = match config::locate_config_file(args.config.as_deref()) {
        Some(path) => {
            info!("Config file: {}", path.display());
            config::load_toml_config(&path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?
        }
        None => None,
    };

    let overrides = ConfigOverrides {
        bind_address: args.bind,
        database_path: args.database,
        webhook_secret: args.webhook_secret,
        llm_api_key: args.llm_api_key,
    };
    let service_config = ServiceConfig::resolve(&overrides, toml_config.as_ref());

    if service_config.signatures_enforced() {
        info!(
            header = %service_config.signature_header,
            tolerance_secs = service_config.signature_tolerance_secs,
            "Webhook signature verification enabled"
        );
    } else {
        warn!("No webhook secret configured: signature verification is BYPASSED (open mode, not for production)");
    }

    info!("Database: {}", service_config.database_path.display());
    let pool = lexline_common::db::init_database(&service_config.database_path)
        .await
        .context("Failed to initialize database")?;

    let extractor = IntakeExtractor::from_settings(&service_config.llm);

    let bind_address = service_config.bind_address.clone();
    let state = AppState::new(pool, service_config, extractor);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("lexline-hooks listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
