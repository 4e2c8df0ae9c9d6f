//! Ingestion worker configuration.

use crate::domain::IngestionError;
use serde::{Deserialize, Serialize};
use shared_types::TopicConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Ingestion worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory holding staging artifacts. Resolved to an absolute path once
    /// at startup.
    pub staging_dir: PathBuf,
    /// Commit at least this often while records are staged (default: 60s)
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// How often the flush triggers are evaluated (default: 1s)
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Commit as soon as this many records are staged (default: 10 000)
    pub flush_threshold_records: usize,
    /// Commit as soon as this many row bytes are staged (default: off)
    pub flush_threshold_bytes: Option<u64>,
    /// Bus topic names
    pub topics: TopicConfig,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./data/staging"),
            flush_interval: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
            flush_threshold_records: 10_000,
            flush_threshold_bytes: None,
            topics: TopicConfig::default(),
        }
    }
}

impl IngestionConfig {
    /// Config for tests: staging in `dir`, fast ticks.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: dir.into(),
            flush_interval: Duration::from_secs(60),
            tick_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.staging_dir.as_os_str().is_empty() {
            return Err(IngestionError::Config("staging_dir cannot be empty".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(IngestionError::Config("flush_interval cannot be 0".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(IngestionError::Config("tick_interval cannot be 0".into()));
        }
        if self.flush_threshold_records == 0 {
            return Err(IngestionError::Config(
                "flush_threshold_records cannot be 0".into(),
            ));
        }
        if self.flush_threshold_bytes == Some(0) {
            return Err(IngestionError::Config(
                "flush_threshold_bytes cannot be 0".into(),
            ));
        }
        if !self.topics.is_valid() {
            return Err(IngestionError::Config(
                "topic names must be non-empty and distinct".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.flush_threshold_records, 10_000);
        assert_eq!(config.flush_threshold_bytes, None);
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = IngestionConfig::default();
        config.flush_threshold_records = 0;
        assert!(matches!(config.validate(), Err(IngestionError::Config(_))));

        let mut config = IngestionConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = IngestionConfig::default();
        config.flush_threshold_bytes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_fields() {
        let config: IngestionConfig = serde_json::from_str(
            r#"{ "staging_dir": "/tmp/s", "flush_interval": "5m", "flush_threshold_bytes": 1048576 }"#,
        )
        .unwrap();

        assert_eq!(config.staging_dir, PathBuf::from("/tmp/s"));
        assert_eq!(config.flush_interval, Duration::from_secs(300));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.flush_threshold_bytes, Some(1_048_576));
    }
}
