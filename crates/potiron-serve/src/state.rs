//! Application state and configuration.

use std::sync::Arc;

use potiron_core::{RedisStore, ScoreStore, Session};

use crate::cache::{ResponseCache, new_cache};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Redis URL of the sensor database.
    pub redis_url: String,

    /// Sensor whose keys are served.
    pub sensor_name: String,

    /// Version string reported to the dashboard.
    pub version: String,

    /// Days of history on evolution pages.
    pub coverage: u32,

    /// Days of history in the top-K sparklines.
    pub short_coverage: u32,

    /// Port of the Prometheus `/metrics` server, 0 to disable.
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `POTIRON_REDIS_URL`: Redis URL (e.g. `redis+unix:///var/run/redis/redis.sock`)
    ///
    /// Optional environment variables:
    /// - `POTIRON_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `POTIRON_SENSOR_NAME`: Sensor name (default: "potiron")
    /// - `POTIRON_VERSION`: Reported version (default: crate version)
    /// - `POTIRON_COVERAGE`: Evolution page window in days (default: 180)
    /// - `POTIRON_SHORT_COVERAGE`: Sparkline window in days (default: 7)
    /// - `POTIRON_METRICS_PORT`: Metrics port (default: 0, disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("POTIRON_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let redis_url = std::env::var("POTIRON_REDIS_URL")
            .map_err(|_| anyhow::anyhow!("POTIRON_REDIS_URL environment variable is required"))?;

        let sensor_name =
            std::env::var("POTIRON_SENSOR_NAME").unwrap_or_else(|_| "potiron".to_string());

        let version = std::env::var("POTIRON_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let coverage = parse_var("POTIRON_COVERAGE", 180)?;
        let short_coverage = parse_var("POTIRON_SHORT_COVERAGE", 7)?;
        let metrics_port = parse_var("POTIRON_METRICS_PORT", 0)?;

        tracing::info!(
            bind_addr = %bind_addr,
            sensor_name = %sensor_name,
            coverage,
            short_coverage,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            redis_url,
            sensor_name,
            version,
            coverage,
            short_coverage,
            metrics_port,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} must be a number: {e}")),
        Err(_) => Ok(default),
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Queries against the configured sensor.
    pub session: Arc<Session>,

    /// Application configuration.
    pub config: Arc<Config>,

    /// Cache of computed responses.
    pub cache: ResponseCache,
}

impl AppState {
    /// Connect to the configured Redis and create the application state.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = RedisStore::open(&config.redis_url)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create the application state over an already opened store.
    pub fn with_store(config: Config, store: Arc<dyn ScoreStore>) -> anyhow::Result<Self> {
        let session = Session::flat(store, &config.sensor_name)?;
        Ok(Self {
            session: Arc::new(session),
            config: Arc::new(config),
            cache: new_cache(),
        })
    }
}
