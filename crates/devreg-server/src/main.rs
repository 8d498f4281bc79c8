//! # devreg-server
//!
//! HTTP server for the device warranty registry.
//!
//! ## Running
//!
//! ```bash
//! # Development, in-memory
//! cargo run --package devreg-server
//!
//! # With a config file
//! ./devreg-server --config /etc/devreg/config.toml
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use devreg_core::config::config_path;
use devreg_core::RegistryConfig;
use devreg_server::api::create_router;
use devreg_server::logging;
use devreg_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

/// Device warranty registry server
#[derive(Parser, Debug)]
#[command(name = "devreg-server")]
#[command(about = "Device passport, warranty and renovation registry")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "DEVREG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let path = config_path(args.config);
    let config = RegistryConfig::load(path.as_deref()).context("loading configuration")?;

    logging::init(config.server.production)?;
    info!(
        config = ?path,
        data_dir = ?config.storage.data_dir,
        timezone = %config.system.timezone,
        "Starting devreg-server"
    );

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = AppState::from_config(&config).context("opening registry")?;
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
