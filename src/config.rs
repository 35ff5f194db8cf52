//! Environment-driven configuration.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub nats_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub upstream_timeout: Duration,
    pub events_subject_prefix: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("nats_url", &self.nats_url)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("events_subject_prefix", &self.events_subject_prefix)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Builds the config from an arbitrary lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|_| default.to_string());

        fn parsed<T>(var: &str, raw: String) -> Result<T, ConfigError>
        where
            T: std::str::FromStr,
            T::Err: std::fmt::Display,
        {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar { var: var.to_string(), reason: e.to_string() })
        }

        let database_url = lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let nats_url = lookup("NATS_URL").ok().filter(|url| !url.trim().is_empty());
        let bind_addr = parsed("STOREFRONT_BIND_ADDR", or_default("STOREFRONT_BIND_ADDR", "0.0.0.0:8083"))?;
        let log_level = or_default("STOREFRONT_LOG_LEVEL", "info");
        let db_max_connections = parsed("STOREFRONT_DB_MAX_CONNECTIONS", or_default("STOREFRONT_DB_MAX_CONNECTIONS", "10"))?;
        let acquire_secs: u64 = parsed("STOREFRONT_DB_ACQUIRE_TIMEOUT_SECS", or_default("STOREFRONT_DB_ACQUIRE_TIMEOUT_SECS", "10"))?;
        let upstream_ms: u64 = parsed("STOREFRONT_UPSTREAM_TIMEOUT_MS", or_default("STOREFRONT_UPSTREAM_TIMEOUT_MS", "5000"))?;
        if upstream_ms == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: "STOREFRONT_UPSTREAM_TIMEOUT_MS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        let events_subject_prefix = or_default("STOREFRONT_EVENTS_SUBJECT_PREFIX", "storefront");

        Ok(Self {
            database_url,
            nats_url,
            bind_addr,
            log_level,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
            upstream_timeout: Duration::from_millis(upstream_ms),
            events_subject_prefix,
        })
    }
}
