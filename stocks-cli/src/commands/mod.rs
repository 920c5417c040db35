//! Command implementations for stocksctl

pub mod migrate;
pub mod serve;

pub use migrate::{run_generate, run_init, run_migrate, run_rollback, run_status};
pub use serve::run_serve;
