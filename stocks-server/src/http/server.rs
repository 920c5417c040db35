//! Axum server setup
//!
//! The accept loop runs until its task is aborted; in-flight requests are
//! not drained.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::service::StockService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: StockService,
}

/// Build the REST router.
pub fn router(service: StockService, request_timeout: Duration) -> Router {
    let state = AppState { service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::stocks::router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the REST accept loop on an already bound listener.
///
/// # Example
///
/// ```ignore
/// let listener = TcpListener::bind("0.0.0.0:8080").await?;
/// serve_rest(listener, service, Duration::from_secs(30)).await?;
/// ```
pub async fn serve_rest(
    listener: TcpListener,
    service: StockService,
    request_timeout: Duration,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server listening");

    axum::serve(listener, router(service, request_timeout)).await
}
