//! # RocksDB Store Adapter
//!
//! Persistent `PatientStore`.
//!
//! ## Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | patient id, 8 bytes big-endian | JSON `PatientRecord` |
//!
//! Big-endian keys sort numerically, so the highest id is the last key.
//! A bulk commit re-reads the staged artifact and applies it as one
//! `WriteBatch`, which RocksDB applies atomically.

use crate::domain::staging::read_records;
use crate::domain::{SealedBatch, StoreError};
use crate::ports::outbound::PatientStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use shared_types::{PatientId, PatientRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// fsync every commit (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/patients"),
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (small buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            sync_writes: false,
        }
    }
}

struct Inner {
    db: DB,
    sync_writes: bool,
    /// Serializes the duplicate check with the batch write.
    commit_lock: Mutex<()>,
}

/// RocksDB-backed patient store
pub struct RocksDbPatientStore {
    inner: Arc<Inner>,
}

impl RocksDbPatientStore {
    /// Open or create the database
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| StoreError::Unavailable(format!("failed to open RocksDB: {e}")))?;
        info!(path = %config.path.display(), "Opened patient store");

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                sync_writes: config.sync_writes,
                commit_lock: Mutex::new(()),
            }),
        })
    }
}

impl Inner {
    fn get(&self, id: PatientId) -> Result<Option<PatientRecord>, StoreError> {
        let value = self
            .db
            .get_pinned(id.to_be_bytes())
            .map_err(|e| StoreError::Unavailable(format!("RocksDB get failed: {e}")))?;
        value.map(|bytes| decode_record(&bytes)).transpose()
    }

    fn last_id(&self) -> Result<Option<PatientId>, StoreError> {
        match self.db.iterator(IteratorMode::End).next() {
            None => Ok(None),
            Some(Ok((key, _))) => decode_key(&key).map(Some),
            Some(Err(e)) => Err(StoreError::Unavailable(format!("RocksDB scan failed: {e}"))),
        }
    }

    fn load(&self, path: &Path) -> Result<usize, StoreError> {
        let records = read_records(path).map_err(|e| StoreError::Commit(e.to_string()))?;

        let _guard = self.commit_lock.lock();
        let mut batch = WriteBatch::default();
        for record in &records {
            let key = record.id.to_be_bytes();
            let exists = self
                .db
                .get_pinned(key)
                .map_err(|e| StoreError::Unavailable(format!("RocksDB get failed: {e}")))?
                .is_some();
            if exists {
                return Err(StoreError::DuplicateId(record.id));
            }
            let value =
                serde_json::to_vec(record).map_err(|e| StoreError::Commit(e.to_string()))?;
            batch.put(key, value);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| StoreError::Commit(format!("RocksDB batch write failed: {e}")))?;
        Ok(records.len())
    }
}

#[async_trait]
impl PatientStore for RocksDbPatientStore {
    async fn max_id(&self) -> Result<Option<PatientId>, StoreError> {
        self.inner.last_id()
    }

    async fn find_by_id(&self, id: PatientId) -> Result<Option<PatientRecord>, StoreError> {
        self.inner.get(id)
    }

    async fn bulk_commit(&self, batch: &SealedBatch) -> Result<usize, StoreError> {
        let inner = Arc::clone(&self.inner);
        let path = batch.path().to_path_buf();
        let committed = tokio::task::spawn_blocking(move || inner.load(&path))
            .await
            .map_err(|e| StoreError::Commit(format!("commit task failed: {e}")))??;
        debug!(batch = batch.name(), records = committed, "Committed batch");
        Ok(committed)
    }
}

fn decode_key(key: &[u8]) -> Result<PatientId, StoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("key of {} bytes", key.len())))?;
    Ok(PatientId::from_be_bytes(bytes))
}

fn decode_record(bytes: &[u8]) -> Result<PatientRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}
