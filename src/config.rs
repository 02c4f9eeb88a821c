//! # Configuration Module
//!
//! Layered configuration loading (component C8): compiled-in defaults are
//! the base layer, an optional TOML file overlays them, and
//! `STRATUMDB_`-prefixed environment variables take final priority.
//!
//! Modeled on the teacher codebase's own config-loading idiom: a typed
//! struct tree deserialized via `serde`, assembled with the `config` crate,
//! and validated once after loading rather than field-by-field at the call
//! site.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const ENV_PREFIX: &str = "STRATUMDB";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    #[error(transparent)]
    Server(#[from] ServerConfigError),

    #[error(transparent)]
    DbEngine(#[from] DbEngineConfigError),

    #[error(transparent)]
    DiskStore(#[from] DiskStoreConfigError),
}

/// The fully assembled, validated configuration for one process.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub db_engine: DbEngineConfig,
    #[serde(default)]
    pub disk_store: DiskStoreConfig,
}

impl Config {
    /// Loads layered configuration: defaults → optional `path` (falls back
    /// to `config.toml`, silently absent is fine) → `STRATUMDB_*` env vars.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        let file_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        if std::path::Path::new(file_path).exists() {
            info!(path = file_path, "loading configuration file");
            builder = builder.add_source(config::File::with_name(file_path));
        } else {
            info!("no configuration file found, using defaults and environment");
        }

        builder = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.db_engine.validate()?;
        self.disk_store.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            db_engine: DbEngineConfig::default(),
            disk_store: DiskStoreConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("invalid host: {0}")]
    InvalidHost(String),
    #[error("invalid port: {0}")]
    InvalidPort(u16),
}

/// TCP/UDP front-end binding configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub udp_port: u16,
    pub udp_buffer_size: usize,
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ServerConfigError> {
        self.host
            .parse::<IpAddr>()
            .map_err(|_| ServerConfigError::InvalidHost(self.host.clone()))?;
        if self.port == 0 {
            return Err(ServerConfigError::InvalidPort(self.port));
        }
        if self.udp_port == 0 {
            return Err(ServerConfigError::InvalidPort(self.udp_port));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // The documented default is the hostname `localhost`, but this
            // loader only accepts IP literals (matching box_kv's own
            // `check_host`, which rejects hostnames outright). `127.0.0.1`
            // is the IP-literal form of that same loopback address.
            host: "127.0.0.1".to_string(),
            port: 8080,
            udp_port: 1053,
            udp_buffer_size: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbEngineConfigError {
    #[error("max_elements_before_flush must be greater than zero")]
    ZeroFlushThreshold,
    #[error("compaction_frequency_in_ms must be greater than zero")]
    ZeroCompactionFrequency,
    #[error("bloom_error_rate must be in (0, 1)")]
    InvalidBloomErrorRate(f64),
}

/// Storage-engine tuning, mirroring `EngineConfig` plus the WAL path.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DbEngineConfig {
    pub wal_path: PathBuf,
    pub max_elements_before_flush: usize,
    pub compaction_frequency_in_ms: u64,
    pub bloom_capacity: usize,
    pub bloom_error_rate: f64,
}

impl DbEngineConfig {
    fn validate(&self) -> Result<(), DbEngineConfigError> {
        if self.max_elements_before_flush == 0 {
            return Err(DbEngineConfigError::ZeroFlushThreshold);
        }
        if self.compaction_frequency_in_ms == 0 {
            return Err(DbEngineConfigError::ZeroCompactionFrequency);
        }
        if !(0.0..1.0).contains(&self.bloom_error_rate) {
            return Err(DbEngineConfigError::InvalidBloomErrorRate(self.bloom_error_rate));
        }
        Ok(())
    }
}

impl Default for DbEngineConfig {
    fn default() -> Self {
        Self {
            wal_path: PathBuf::from("wal.aof"),
            max_elements_before_flush: 1024,
            compaction_frequency_in_ms: 1000,
            bloom_capacity: 1_000_000,
            bloom_error_rate: 0.0001,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiskStoreConfigError {
    #[error("num_of_partitions must be greater than zero")]
    ZeroPartitions,
}

/// Partitioned snapshot store configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiskStoreConfig {
    pub num_of_partitions: usize,
    pub directory: PathBuf,
}

impl DiskStoreConfig {
    fn validate(&self) -> Result<(), DiskStoreConfigError> {
        if self.num_of_partitions == 0 {
            return Err(DiskStoreConfigError::ZeroPartitions);
        }
        Ok(())
    }
}

impl Default for DiskStoreConfig {
    fn default() -> Self {
        Self {
            num_of_partitions: 10,
            directory: PathBuf::from("./data"),
        }
    }
}
