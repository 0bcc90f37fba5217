//! Application Configuration
//!
//! Configuration for the ledger application layer, read from the
//! environment with defaults for every key.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Ledger application configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// PostgreSQL URL; `None` selects the in-memory store
    pub database_url: Option<String>,
    /// Pool size
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Deadline for one transaction, begin through commit
    pub tx_timeout: Duration,
    /// Row-lock wait limit; PostgreSQL `lock_timeout` per transaction
    pub lock_wait_timeout: Duration,
    /// HTTP listen address
    pub bind_addr: SocketAddr,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            tx_timeout: Duration::from_millis(5000),
            lock_wait_timeout: Duration::from_millis(2000),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 31113)),
        }
    }
}

impl LedgerConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());

        Ok(Self {
            database_url,
            max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout: Duration::from_secs(parse(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            tx_timeout: Duration::from_millis(parse(
                &lookup,
                "TX_TIMEOUT_MS",
                defaults.tx_timeout_ms(),
            )?),
            lock_wait_timeout: Duration::from_millis(parse(
                &lookup,
                "LOCK_WAIT_TIMEOUT_MS",
                defaults.lock_wait_timeout.as_millis() as u64,
            )?),
            bind_addr: parse(&lookup, "BIND_ADDR", defaults.bind_addr)?,
        })
    }

    /// Settings for tests and local runs: in-memory store, short timeouts
    pub fn development() -> Self {
        Self {
            tx_timeout: Duration::from_millis(2000),
            lock_wait_timeout: Duration::from_millis(500),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 31113)),
            ..Self::default()
        }
    }

    pub fn tx_timeout_ms(&self) -> u64 {
        self.tx_timeout.as_millis() as u64
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
