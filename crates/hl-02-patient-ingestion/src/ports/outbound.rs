//! Outbound (Driven) ports for the ingestion worker.
//!
//! The Store Adapter is the only external dependency: point lookups, the
//! highest committed id, and transactional bulk load of a sealed batch.

use crate::domain::staging::read_records;
use crate::domain::{SealedBatch, StoreError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{PatientId, PatientRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Durable store of committed patients.
///
/// Implementations must make `bulk_commit` all-or-nothing: on `Err`, no
/// record of the batch is visible.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Highest committed id, or `None` for an empty store.
    async fn max_id(&self) -> Result<Option<PatientId>, StoreError>;

    /// Look up one committed record.
    async fn find_by_id(&self, id: PatientId) -> Result<Option<PatientRecord>, StoreError>;

    /// Load a sealed batch from its staging artifact.
    ///
    /// # Returns
    /// Number of records committed.
    async fn bulk_commit(&self, batch: &SealedBatch) -> Result<usize, StoreError>;
}

/// In-memory store.
///
/// Loads batches the way a `COPY patients FROM '<artifact>' CSV HEADER`
/// would: it re-reads the artifact on disk instead of trusting the
/// in-memory copy, so a batch only commits if its artifact is intact.
#[derive(Default)]
pub struct InMemoryPatientStore {
    records: RwLock<BTreeMap<PatientId, PatientRecord>>,
    /// Remaining commits to reject (failure injection).
    fail_commits: Mutex<u32>,
    commits: AtomicU64,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with committed records.
    pub fn with_records(records: impl IntoIterator<Item = PatientRecord>) -> Self {
        let store = Self::new();
        store
            .records
            .write()
            .extend(records.into_iter().map(|r| (r.id, r)));
        store
    }

    /// Reject the next `n` bulk commits with `StoreError::Unavailable`.
    pub fn fail_next_commits(&self, n: u32) {
        *self.fail_commits.lock() = n;
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Successful bulk commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Every committed id in ascending order.
    pub fn ids(&self) -> Vec<PatientId> {
        self.records.read().keys().copied().collect()
    }

    fn take_injected_failure(&self) -> bool {
        let mut remaining = self.fail_commits.lock();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn max_id(&self) -> Result<Option<PatientId>, StoreError> {
        Ok(self.records.read().keys().next_back().copied())
    }

    async fn find_by_id(&self, id: PatientId) -> Result<Option<PatientRecord>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn bulk_commit(&self, batch: &SealedBatch) -> Result<usize, StoreError> {
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let path = batch.path().to_path_buf();
        let rows = tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .map_err(|e| StoreError::Commit(e.to_string()))?
            .map_err(|e| StoreError::Commit(e.to_string()))?;

        let mut records = self.records.write();
        if let Some(dup) = rows.iter().find(|r| records.contains_key(&r.id)) {
            return Err(StoreError::DuplicateId(dup.id));
        }
        let count = rows.len();
        records.extend(rows.into_iter().map(|r| (r.id, r)));
        drop(records);

        self.commits.fetch_add(1, Ordering::Relaxed);
        debug!(batch = batch.name(), records = count, "Committed batch");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StagingBatch;
    use tempfile::TempDir;

    fn record(id: PatientId) -> PatientRecord {
        PatientRecord {
            id,
            name: format!("P{id}"),
            last_name: "Li".into(),
            date_of_birth: "1990-01-01".into(),
            blood_type: 1,
            rh_factor: "-".into(),
        }
    }

    fn sealed(dir: &TempDir, ids: &[PatientId]) -> SealedBatch {
        let mut batch = StagingBatch::create(dir.path()).unwrap();
        for id in ids {
            batch.append(record(*id)).unwrap();
        }
        batch.seal()
    }

    #[tokio::test]
    async fn test_max_id_of_empty_store() {
        let store = InMemoryPatientStore::new();
        assert_eq!(store.max_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bulk_commit_reads_artifact() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryPatientStore::new();

        let committed = store.bulk_commit(&sealed(&dir, &[1, 2, 3])).await.unwrap();

        assert_eq!(committed, 3);
        assert_eq!(store.max_id().await.unwrap(), Some(3));
        assert_eq!(store.find_by_id(2).await.unwrap(), Some(record(2)));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_aborts_whole_batch() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryPatientStore::with_records([record(2)]);

        let result = store.bulk_commit(&sealed(&dir, &[1, 2, 3])).await;

        assert_eq!(result, Err(StoreError::DuplicateId(2)));
        assert_eq!(store.ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryPatientStore::new();
        store.fail_next_commits(1);
        let batch = sealed(&dir, &[1]);

        assert!(store.bulk_commit(&batch).await.is_err());
        assert!(store.is_empty());
        assert_eq!(store.bulk_commit(&batch).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_commit() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryPatientStore::new();
        let batch = sealed(&dir, &[1]);
        std::fs::remove_file(batch.path()).unwrap();

        assert!(matches!(
            store.bulk_commit(&batch).await,
            Err(StoreError::Commit(_))
        ));
    }
}
