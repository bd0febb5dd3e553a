//! Process configuration read from the environment.
//!
//! Unset variables take their default. Set-but-unparseable values are
//! logged and also fall back to the default; only a pool size of zero is
//! rejected, and that happens when the store connects.

use std::str::FromStr;
use std::time::Duration;

use crate::store::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POOL_SIZE, StoreConfig};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const HOST_ENV: &str = "HOST";
const PORT_ENV: &str = "PORT";
const POOL_SIZE_ENV: &str = "TODO_POOL_SIZE";
const ACQUIRE_TIMEOUT_ENV: &str = "TODO_POOL_ACQUIRE_TIMEOUT_MS";
const LOG_LEVEL_ENV: &str = "RUST_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let acquire_timeout_ms = read_parsed(
            &lookup,
            ACQUIRE_TIMEOUT_ENV,
            DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64,
        );
        Self {
            host: text(HOST_ENV, DEFAULT_HOST),
            port: read_parsed(&lookup, PORT_ENV, DEFAULT_PORT),
            log_level: text(LOG_LEVEL_ENV, DEFAULT_LOG_LEVEL),
            store: StoreConfig {
                pool_size: read_parsed(&lookup, POOL_SIZE_ENV, DEFAULT_POOL_SIZE),
                acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!("{name} is set but empty; using default");
        return default;
    }
    match trimmed.parse::<T>() {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(value = trimmed, error = %err, "Invalid {name}; using default");
            default
        }
    }
}
