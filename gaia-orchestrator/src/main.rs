//! gaia-orchestrator - ClickUp wiki creation service
//!
//! Accepts wiki descriptions over REST or ClickUp Automation webhooks and
//! builds the corresponding doc and page tree in the background.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use gaia_common::Settings;
use gaia_orchestrator::services::ClickUpClient;
use gaia_orchestrator::AppState;

/// Command-line arguments for gaia-orchestrator
#[derive(Parser, Debug)]
#[command(name = "gaia-orchestrator")]
#[command(about = "ClickUp wiki orchestrator")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "GAIA_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (filter_handle, filter_from_env) = init_tracing();

    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if !filter_from_env {
        apply_log_level(&filter_handle, &settings.logging.level)?;
    }

    info!(
        "Starting gaia-orchestrator v{} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );
    info!("ClickUp API: {}", settings.clickup.api_base);
    if settings.server.api_secret.is_empty() {
        warn!("API_SECRET is not set; routes are unauthenticated");
    }

    let client = ClickUpClient::new(&settings).context("Failed to build ClickUp client")?;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let state = AppState::new(settings, Arc::new(client));
    let app = gaia_orchestrator::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/api/v1/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete; in-memory jobs discarded");
    Ok(())
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install logging before configuration loads
///
/// `RUST_LOG` wins when set; otherwise the filter starts at `info` and is
/// swapped for the configured level once settings are known. Returns the
/// reload handle and whether `RUST_LOG` supplied the filter.
fn init_tracing() -> (FilterHandle, bool) {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    (handle, from_env)
}

fn apply_log_level(handle: &FilterHandle, level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level))?;
    handle
        .reload(filter)
        .context("Failed to apply configured log level")
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
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
