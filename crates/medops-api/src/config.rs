//! Server configuration, read once from the environment at startup.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use medops_records::application::command_processor::ProcessorConfig;

use crate::error::AppError;

/// Knobs of the command engine and its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Snapshot cadence, retry budget, and lookup timeout.
    pub processor: ProcessorConfig,
    /// Upper bound on a single subscriber invocation.
    pub subscriber_timeout: Duration,
    /// Per-subscription notification buffer.
    pub notification_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            subscriber_timeout: Duration::from_secs(1),
            notification_buffer: 64,
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `DATABASE_URL`, required.
    pub database_url: String,
    /// `HOST`, defaults to `0.0.0.0`.
    pub host: String,
    /// `PORT`, defaults to 3000.
    pub port: u16,
    /// `DATABASE_MAX_CONNECTIONS`, defaults to 10.
    pub max_connections: u32,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    /// Engine knobs.
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// fails to parse or is out of range.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".to_owned()))?;

        let snapshot_interval: i64 = positive(&lookup, "SNAPSHOT_INTERVAL", 5)?;
        let max_attempts: u32 = positive(&lookup, "COMMAND_MAX_ATTEMPTS", 3)?;
        let lookup_timeout_ms: u64 = positive(&lookup, "LOOKUP_TIMEOUT_MS", 2000)?;
        let subscriber_timeout_ms: u64 = positive(&lookup, "SUBSCRIBER_TIMEOUT_MS", 1000)?;
        let notification_buffer: usize = positive(&lookup, "NOTIFICATION_BUFFER", 64)?;

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parsed(&lookup, "PORT", 3000)?,
            max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|e| !e.trim().is_empty()),
            engine: EngineConfig {
                processor: ProcessorConfig {
                    snapshot_interval,
                    max_attempts,
                    lookup_timeout: Duration::from_millis(lookup_timeout_ms),
                },
                subscriber_timeout: Duration::from_millis(subscriber_timeout_ms),
                notification_buffer,
            },
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
    }
}

/// Like [`parsed`], but zero and negative values are rejected.
fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr + Default + PartialOrd,
    T::Err: Display,
{
    let value = parsed(lookup, key, default)?;
    if value <= T::default() {
        return Err(AppError::Config(format!("{key} must be greater than 0")));
    }
    Ok(value)
}
