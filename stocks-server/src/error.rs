//! Error types for stocks-server
//!
//! Every failure the core can produce carries one of the [`ErrorKind`]s so
//! front ends can map it without string matching.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity absent for a lookup by id
    NotFound,
    /// A persisted invariant would be breached
    ConstraintViolation,
    /// Malformed caller input
    Validation,
    /// Connection, query, transaction or filesystem failure
    StoreFault,
    /// Missing or invalid configuration
    ConfigFault,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: Uuid },

    #[error("constraint violated on {field}: {reason}")]
    ConstraintViolation {
        field: &'static str,
        reason: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("migration error: {0}")]
    Migration(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

impl Error {
    /// Create a not-found error for a stock id
    pub fn stock_not_found(id: Uuid) -> Self {
        Self::NotFound {
            resource: "stock",
            id,
        }
    }

    /// Create a constraint violation error
    pub fn constraint(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            field,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create an IO error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a listener bind error
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Create a migration error
    pub fn migration(reason: impl Into<String>) -> Self {
        Self::Migration(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::Config(_) | Self::Bind { .. } => ErrorKind::ConfigFault,
            Self::Database(_) | Self::Io { .. } | Self::Migration(_) => ErrorKind::StoreFault,
        }
    }
}
