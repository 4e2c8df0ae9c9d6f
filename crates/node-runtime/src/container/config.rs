//! # Node Configuration
//!
//! Unified configuration for both halves of the node.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file named by `HL_CONFIG`
//! 3. `HL_HTTP_PORT`, `HL_STAGING_DIR`, `HL_DATA_DIR`, `HL_LOG_LEVEL`
//!
//! `RUST_LOG`, when set, overrides the log level at subscriber init.

use hl_01_api_gateway::GatewayConfig;
use hl_02_patient_ingestion::IngestionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "HL_CONFIG";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP gateway and correlator.
    pub gateway: GatewayConfig,
    /// Ingestion worker and flush scheduler.
    pub ingestion: IngestionConfig,
    /// Store backend.
    pub storage: StorageConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Load from `HL_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(PathBuf::from(path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing sections and fields take their defaults.
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Apply `HL_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("HL_HTTP_PORT") {
            self.gateway.http.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "HL_HTTP_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = lookup("HL_STAGING_DIR") {
            self.ingestion.staging_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("HL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("HL_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Cross-section checks; each crate validates its own section on start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("gateway: {e}")))?;
        self.ingestion
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("ingestion: {e}")))?;
        if self.gateway.topics != self.ingestion.topics {
            return Err(ConfigError::Invalid(
                "gateway and ingestion must use the same topic names".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for `NodeConfig`.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// An override variable has an unusable value.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
    /// Sections disagree or fail their own validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; committed records are lost on exit.
    #[default]
    Memory,
    /// RocksDB under `data_dir` (requires the `rocksdb` feature).
    Rocksdb,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which store adapter to open.
    pub backend: StorageBackend,
    /// Data directory for persistent backends.
    pub data_dir: PathBuf,
    /// fsync every bulk commit.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `info,hl_02_patient_ingestion=debug`.
    pub level: String,
    /// One JSON object per line instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
