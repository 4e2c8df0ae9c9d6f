//! Store adapter selection.

use crate::container::config::{StorageBackend, StorageConfig};
use anyhow::Result;
use hl_02_patient_ingestion::{InMemoryPatientStore, PatientStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Open the configured store backend.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn PatientStore>> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory patient store; committed records are lost on exit");
            Ok(Arc::new(InMemoryPatientStore::new()))
        }
        StorageBackend::Rocksdb => open_rocksdb(config),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &StorageConfig) -> Result<Arc<dyn PatientStore>> {
    use anyhow::Context;
    use hl_02_patient_ingestion::{RocksDbConfig, RocksDbPatientStore};

    let rocks = RocksDbConfig {
        path: config.data_dir.join("patients"),
        sync_writes: config.sync_writes,
        ..Default::default()
    };
    info!(path = %rocks.path.display(), "Opening RocksDB patient store");
    let store = RocksDbPatientStore::open(rocks).context("failed to open RocksDB patient store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(config: &StorageConfig) -> Result<Arc<dyn PatientStore>> {
    info!(data_dir = %config.data_dir.display(), "RocksDB backend requested");
    anyhow::bail!("storage backend `rocksdb` requires building node-runtime with `--features rocksdb`")
}
