//! `serve`: run both front ends
//!
//! Everything comes from the environment (or `.env`); see
//! `stocks_server::config` for the variables.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use stocks_server::bootstrap;
use stocks_server::ServerConfig;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Per-request timeout in seconds (overrides REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

/// Run the servers (blocks until shutdown)
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::from_env().context("Invalid server configuration")?;
    if let Some(secs) = args.request_timeout {
        config.request_timeout = Duration::from_secs(secs);
    }

    tracing::info!(
        rest = %config.rest.addr(),
        rpc = ?config.rpc.as_ref().map(|rpc| rpc.addr()).ok(),
        timeout_secs = config.request_timeout.as_secs(),
        "starting stock service"
    );

    bootstrap::run(config).await.context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
