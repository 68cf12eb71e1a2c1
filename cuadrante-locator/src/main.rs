//! cuadrante-locator - Police quadrant locator service
//!
//! **Module Identity:**
//! - Name: cuadrante-locator
//! - Port: 5731 (default)
//!
//! Resolves a coordinate to its police quadrant, roster and nearest CAI, with
//! ordered fallback across official, alternative and offline sources.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cuadrante_locator::{AppState, Locator};

/// Command-line arguments for cuadrante-locator
#[derive(Parser, Debug)]
#[command(name = "cuadrante-locator")]
#[command(about = "Police quadrant locator service")]
#[command(version)]
struct Args {
    /// Config file (overrides CUADRANTE_CONFIG and the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "CUADRANTE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so the file can set the level
    let mut config = cuadrante_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cuadrante-locator");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let locator = match Locator::from_config(&config) {
        Ok(locator) => Arc::new(locator),
        Err(e) => {
            error!(error = %e, "Invalid locator configuration");
            return Err(e).context("Failed to build locator");
        }
    };
    info!(
        tiers = ?locator.tier_names(),
        strategies = ?locator.strategy_names(),
        "Locator initialized"
    );

    // Warm-up runs beside the server; a failed source only logs
    {
        let locator = Arc::clone(&locator);
        tokio::spawn(async move {
            locator.warm_up().await;
        });
    }

    let app = cuadrante_locator::build_router(AppState::new(locator));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
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
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
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
