//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;
pub mod settings;

pub use settings::ExecutorSettings;

use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    /// Connection URLs for the durable queue and the ledger. `None` when
    /// loaded for an in-process run.
    pub stores: Option<StoreConfig>,
    /// Base URL of the external service tasks are executed against.
    pub external_api_url: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub executor: ExecutorSettings,
}

#[derive(Debug)]
pub struct StoreConfig {
    /// Postgres with the pgmq extension, backing the task queues.
    pub database_url: SecretString,
    /// Key/value store backing the completion ledger.
    pub redis_url: SecretString,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        let stores = StoreConfig {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            redis_url: SecretString::from(required_var("REDIS_URL")?),
        };
        Self::load(Some(stores))
    }

    /// Load everything except the store URLs, for runs that keep the queue
    /// and ledger in process. `DATABASE_URL` and `REDIS_URL` are not read.
    pub fn from_env_in_memory() -> Result<Self> {
        Self::load(None)
    }

    fn load(stores: Option<StoreConfig>) -> Result<Self> {
        Ok(Self {
            stores,
            external_api_url: required_var("EXTERNAL_API_URL")?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            executor: ExecutorSettings::from_env()?,
        })
    }

    /// Store URLs, or a config error if this config was loaded without them.
    pub fn stores(&self) -> Result<&StoreConfig> {
        self.stores.as_ref().ok_or_else(|| {
            Error::Config("store URLs were not loaded (in-memory configuration)".to_string())
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Parse an optional numeric environment variable.
pub(crate) fn numeric_var(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name} must be a non-negative integer: {e}"))),
        Err(_) => Ok(None),
    }
}
