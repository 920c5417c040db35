//! Dual-protocol server bootstrap
//!
//! One pool, one repository and one [`StockService`] back both front ends.
//! The REST listener must bind; the RPC listener is best effort and its
//! absence leaves the process serving REST only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ListenConfig, ServerConfig};
use crate::db::{self, PgStockRepo, StockStore};
use crate::error::{Error, Result};
use crate::http::serve_rest;
use crate::rpc::serve_rpc;
use crate::service::StockService;

/// Upper bound on the startup reachability check
const STARTUP_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect, build the shared service and serve until Ctrl+C / SIGTERM.
pub async fn run(config: ServerConfig) -> Result<()> {
    tracing::info!(database = ?config.database, "connecting to database");
    let pool = db::connect_lazy(&config.database);

    // Listeners bind without waiting for the database.
    let probe = pool.clone();
    tokio::spawn(async move { database_reachable(&probe, STARTUP_PING_TIMEOUT).await });

    let store: Arc<dyn StockStore> = Arc::new(PgStockRepo::new(pool));
    let service = StockService::new(store);

    serve_both(
        service,
        &config.rest,
        config.rpc,
        config.request_timeout,
        shutdown_signal(),
    )
    .await
}

/// Ping the database, giving up after `limit`.
async fn database_reachable(pool: &PgPool, limit: Duration) -> bool {
    match tokio::time::timeout(limit, db::ping(pool)).await {
        Ok(Ok(())) => {
            tracing::info!("database reachable");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "database ping failed, requests will fail until it is reachable");
            false
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = limit.as_millis() as u64,
                "database ping timed out, requests will fail until it is reachable"
            );
            false
        }
    }
}

/// Bind both front ends and run their accept loops.
///
/// Returns once both loops have ended, or as soon as `shutdown` resolves,
/// in which case the loops are aborted without draining.
pub async fn serve_both(
    service: StockService,
    rest: &ListenConfig,
    rpc: Result<ListenConfig>,
    request_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let rest_listener = TcpListener::bind(rest.addr())
        .await
        .map_err(|e| Error::bind(rest.addr(), e))?;

    let rpc_listener = match rpc {
        Ok(rpc) => match TcpListener::bind(rpc.addr()).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::warn!(addr = %rpc.addr(), error = %e, "failed to bind gRPC server, serving REST only");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "gRPC server not started, serving REST only");
            None
        }
    };

    let rest_task = tokio::spawn(serve_rest(rest_listener, service.clone(), request_timeout));
    let rpc_task = rpc_listener
        .map(|listener| tokio::spawn(serve_rpc(listener, service, request_timeout)));

    let mut aborts = vec![rest_task.abort_handle()];
    aborts.extend(rpc_task.as_ref().map(JoinHandle::abort_handle));

    let loops = async move {
        let rest_exit = rest_task.await;
        if let Some(task) = rpc_task {
            log_exit("gRPC", task.await);
        }
        log_exit("REST", rest_exit);
    };

    tokio::select! {
        _ = loops => {}
        _ = shutdown => {
            tracing::info!("shutting down");
            for handle in aborts {
                handle.abort();
            }
        }
    }

    Ok(())
}

fn log_exit<E: std::fmt::Display>(
    front_end: &str,
    exit: std::result::Result<std::result::Result<(), E>, tokio::task::JoinError>,
) {
    match exit {
        Ok(Ok(())) => tracing::info!(front_end, "server stopped"),
        Ok(Err(e)) => tracing::error!(front_end, error = %e, "server failed"),
        Err(e) => tracing::error!(front_end, error = %e, "server task ended abnormally"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}
