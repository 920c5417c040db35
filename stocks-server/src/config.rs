//! Configuration loaded from environment variables
//!
//! Database (either one JSON blob or discrete variables):
//! - `DB_CONFIG`: `{"host": .., "port": .., "user": .., "pass": .., "db_name": ..}`
//! - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`, `DB_NAME`
//! - `DB_MAX_CONNECTIONS`: pool size (default 5)
//!
//! Front ends:
//! - `SERVER_ADDRESS`, `SERVER_PORT`: REST listener (required)
//! - `GRPC_ADDRESS` (default 127.0.0.1), `GRPC_PORT`: RPC listener (optional)
//! - `REQUEST_TIMEOUT_SECS`: per-request timeout for both (default 30)
//!
//! Every loader has a `from_lookup` twin taking the variable source as a
//! closure, which is what tests use.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::error::{Error, Result};

/// Default maximum connections for the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DEFAULT_GRPC_ADDRESS: &str = "127.0.0.1";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| Error::config(format!("failed to load '{}' env param", key)))
}

fn parse_port(key: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| Error::config(format!("'{}' is not a valid port: {}", key, raw)))
}

/// Connection parameters for the relational store
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

// Keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

#[derive(Deserialize)]
struct DatabaseBlob {
    host: String,
    port: PortValue,
    user: String,
    pass: String,
    db_name: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                Error::config(format!("'DB_MAX_CONNECTIONS' is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        if let Some(blob) = lookup("DB_CONFIG") {
            let parsed: DatabaseBlob = serde_json::from_str(&blob)
                .map_err(|e| Error::config(format!("'DB_CONFIG' is not valid JSON: {}", e)))?;
            let port = match parsed.port {
                PortValue::Number(port) => port,
                PortValue::Text(raw) => parse_port("DB_CONFIG.port", &raw)?,
            };
            return Ok(Self {
                host: parsed.host,
                port,
                user: parsed.user,
                password: parsed.pass,
                database: parsed.db_name,
                max_connections,
            });
        }

        Ok(Self {
            host: required(&lookup, "DB_HOST")?,
            port: parse_port("DB_PORT", &required(&lookup, "DB_PORT")?)?,
            user: required(&lookup, "DB_USER")?,
            password: required(&lookup, "DB_PASS")?,
            database: required(&lookup, "DB_NAME")?,
            max_connections,
        })
    }

    /// Build sqlx connect options from the discrete parameters.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Address a front end listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl ListenConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// REST listener from `SERVER_ADDRESS` / `SERVER_PORT`
    pub fn rest_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = required(&lookup, "SERVER_ADDRESS")?;
        let port = parse_port("SERVER_PORT", &required(&lookup, "SERVER_PORT")?)?;
        Ok(Self { host, port })
    }

    /// RPC listener from `GRPC_ADDRESS` / `GRPC_PORT`
    pub fn rpc_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("GRPC_PORT")
            .ok_or_else(|| Error::config("failed to start gRPC server, missing port"))?;
        let port = parse_port("GRPC_PORT", &port)
            .map_err(|_| Error::config("failed to start gRPC server, faulty port"))?;
        let host = lookup("GRPC_ADDRESS").unwrap_or_else(|| DEFAULT_GRPC_ADDRESS.to_owned());
        Ok(Self { host, port })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything `serve` needs
#[derive(Debug)]
pub struct ServerConfig {
    pub database: DatabaseConfig,
    pub rest: ListenConfig,
    /// RPC settings, or the reason the RPC front end is unavailable
    pub rpc: Result<ListenConfig>,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Load server configuration.
    ///
    /// Database and REST settings are required; a problem with the RPC
    /// settings is kept in `rpc` instead of failing the load.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("'REQUEST_TIMEOUT_SECS' is not a number: {}", raw))
            })?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            rest: ListenConfig::rest_from_lookup(&lookup)?,
            rpc: ListenConfig::rpc_from_lookup(&lookup),
            request_timeout,
        })
    }
}

/// Directory holding migration units, from `MIGRATIONS_DIR`
pub fn migrations_dir_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("MIGRATIONS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR))
}

pub fn migrations_dir_from_env() -> PathBuf {
    migrations_dir_from_lookup(env_lookup)
}
