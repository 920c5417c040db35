//! Database layer - connection pool, repositories and migrations
//!
//! # Design Principles
//!
//! - One connection pool built at startup and shared by handle
//! - Row locks and transactions are the only concurrency control
//! - Schema changes go through the migration engine, never ad hoc DDL

pub mod migrator;
pub mod pool;
pub mod repos;

pub use migrator::{Migrator, MigrationState};
pub use pool::{connect, connect_lazy, connect_url, ping};
pub use repos::*;
