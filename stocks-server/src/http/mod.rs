//! REST front end
//!
//! Axum server with:
//! - Request tracing
//! - Per-request timeout
//! - JSON error responses

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{router, serve_rest, AppState};
