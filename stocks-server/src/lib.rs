//! stocks-server: stock inventory service
//!
//! A Postgres-backed stock repository served over REST (axum) and gRPC
//! (tonic) from one process, plus the schema migration engine driven by
//! `stocksctl`.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod rpc;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::{DatabaseConfig, ListenConfig, ServerConfig};
pub use error::{Error, ErrorKind, Result};
pub use service::StockService;
