//! # Node Container
//!
//! Configuration and construction of the node's shared collaborators.

pub mod config;
pub mod storage;

pub use config::{ConfigError, LoggingConfig, NodeConfig, StorageBackend, StorageConfig};
pub use storage::open_store;
