//! Repository implementations for database access
//!
//! Repositories follow these patterns:
//! - Existence checked under a row lock before any mutation
//! - Transactions for every write
//! - Not-found is its own error kind, separate from store faults

pub mod stocks;

pub use stocks::{PgStockRepo, StockStore};
