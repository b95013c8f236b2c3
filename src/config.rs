//! Configuration module
//!
//! Loads configuration from environment variables once at startup. The
//! resulting struct is handed to the store and engine constructors.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which `RecordStore` backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::InvalidValue("STORE_BACKEND")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("LOG_FORMAT")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (unused by the memory backend)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub store_backend: StoreBackend,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,

    /// Upper bound on one transfer attempt, commit included
    pub transfer_timeout: Duration,

    /// Extra attempts after a transient store failure
    pub transfer_max_retries: u32,

    pub transfer_retry_backoff: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend: StoreBackend = env_or("STORE_BACKEND", "postgres").parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env_or("HOST", "127.0.0.1");
        let port = parse_env("PORT", "3000")?;
        let environment = env_or("ENVIRONMENT", "development");
        let log_format = env_or("LOG_FORMAT", "pretty").parse()?;

        let transfer_timeout = Duration::from_millis(parse_env("TRANSFER_TIMEOUT_MS", "5000")?);
        let transfer_max_retries = parse_env("TRANSFER_MAX_RETRIES", "0")?;
        let transfer_retry_backoff =
            Duration::from_millis(parse_env("TRANSFER_RETRY_BACKOFF_MS", "50")?);

        Ok(Self {
            database_url,
            database_max_connections,
            store_backend,
            host,
            port,
            environment,
            log_format,
            transfer_timeout,
            transfer_max_retries,
            transfer_retry_backoff,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env_or(name, default)
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
