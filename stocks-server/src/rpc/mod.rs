//! gRPC front end (`stocks.v1.StockService`)

pub mod proto;
pub mod server;
pub mod service;

pub use server::serve_rpc;
pub use service::StockRpc;
