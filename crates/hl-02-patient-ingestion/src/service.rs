//! Ingestion service - the inbound API implementation.
//!
//! ## Startup
//!
//! ```text
//! resolve staging dir ──► recover leftover artifacts ──► seed next_id ──► open batch
//!                              (commit, then discard)       max_id + 1
//! ```
//!
//! Recovery runs before seeding: ids of a batch that was staged but never
//! committed are not visible to `max_id`, so seeding first could hand them
//! out a second time.

use crate::config::IngestionConfig;
use crate::domain::staging::{find_artifacts, resolve_staging_dir};
use crate::domain::{append_blocking, BatchBuffer, IngestionError, SealedBatch};
use crate::ports::inbound::IngestionApi;
use crate::ports::outbound::PatientStore;
use async_trait::async_trait;
use shared_types::{check_patient_id, NewPatient, PatientRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ingestion service state
pub struct IngestionService {
    store: Arc<dyn PatientStore>,
    buffer: Arc<BatchBuffer>,
}

impl IngestionService {
    /// Recover, seed the id counter and open the first staging batch.
    ///
    /// # Errors
    /// - `Config`: invalid configuration
    /// - `Staging`: the staging directory is unusable
    /// - `Recovery`: a leftover batch could not be committed
    pub async fn start(
        store: Arc<dyn PatientStore>,
        config: &IngestionConfig,
    ) -> Result<Self, IngestionError> {
        config.validate()?;

        let staging_dir = resolve_staging_dir(&config.staging_dir)?;
        let recovered = recover_artifacts(store.as_ref(), &staging_dir).await?;

        let next_id = store.max_id().await?.map_or(1, |max| max + 1);
        let buffer = BatchBuffer::open(staging_dir.clone(), next_id)?;

        info!(
            staging_dir = %staging_dir.display(),
            next_id,
            recovered,
            "Ingestion service started"
        );

        Ok(Self {
            store,
            buffer: Arc::new(buffer),
        })
    }

    /// The shared batch buffer, for the flush scheduler.
    pub fn buffer(&self) -> Arc<BatchBuffer> {
        Arc::clone(&self.buffer)
    }

    /// The store adapter, for the flush scheduler.
    pub fn store(&self) -> Arc<dyn PatientStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn create_patient(&self, patient: NewPatient) -> Result<PatientRecord, IngestionError> {
        patient.validate()?;
        let record = append_blocking(&self.buffer, patient).await?;
        debug!(id = record.id, "Staged patient");
        Ok(record)
    }

    async fn get_patient(&self, id: i64) -> Result<PatientRecord, IngestionError> {
        let id = check_patient_id(id)?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or(IngestionError::NotFound(id))
    }
}

/// Commit every artifact a previous run left behind, lowest ids first.
///
/// Returns the number of records committed.
async fn recover_artifacts(
    store: &dyn PatientStore,
    staging_dir: &Path,
) -> Result<usize, IngestionError> {
    let mut batches = Vec::new();
    for path in find_artifacts(staging_dir)? {
        let batch = SealedBatch::load(&path)?;
        if batch.is_empty() {
            batch.discard()?;
        } else {
            batches.push(batch);
        }
    }
    batches.sort_by_key(|b| b.first_id());

    let mut recovered = 0;
    for batch in batches {
        // Commits are all-or-nothing, so one committed id means the whole
        // batch landed and only the discard was missed.
        if let Some(first) = batch.first_id() {
            if store.find_by_id(first).await?.is_some() {
                warn!(batch = batch.name(), "Leftover batch already committed, discarding");
                batch.discard()?;
                continue;
            }
        }

        let committed = store
            .bulk_commit(&batch)
            .await
            .map_err(|source| IngestionError::Recovery {
                path: batch.path().to_path_buf(),
                source,
            })?;
        info!(batch = batch.name(), records = committed, "Recovered staged batch");
        recovered += committed;
        batch.discard()?;
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StagingBatch;
    use crate::ports::outbound::InMemoryPatientStore;
    use shared_types::{ErrorKind, PatientId, ValidationError};
    use tempfile::TempDir;

    fn ann() -> NewPatient {
        NewPatient {
            name: "Ann".into(),
            last_name: "Li".into(),
            date_of_birth: "1990-01-01".into(),
            blood_type: 2,
            rh_factor: "+".into(),
        }
    }

    fn record(id: PatientId) -> PatientRecord {
        ann().into_record(id)
    }

    async fn start(
        store: &Arc<InMemoryPatientStore>,
        dir: &TempDir,
    ) -> Result<IngestionService, IngestionError> {
        IngestionService::start(
            Arc::clone(store) as Arc<dyn PatientStore>,
            &IngestionConfig::for_testing(dir.path()),
        )
        .await
    }

    #[tokio::test]
    async fn test_first_create_on_empty_store_gets_id_1() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let service = start(&store, &dir).await.unwrap();

        let created = service.create_patient(ann()).await.unwrap();

        assert_eq!(created, record(1));
    }

    #[tokio::test]
    async fn test_ids_continue_after_store_max() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::with_records((1..=5).map(record)));
        let service = start(&store, &dir).await.unwrap();

        assert_eq!(service.create_patient(ann()).await.unwrap().id, 6);
        assert_eq!(service.create_patient(ann()).await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_invalid_create_consumes_no_id() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let service = start(&store, &dir).await.unwrap();

        let mut bad = ann();
        bad.rh_factor = "x".into();
        let err = service.create_patient(bad).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(service.buffer().size().records, 0);
        assert_eq!(service.create_patient(ann()).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_get_rejects_non_positive_ids() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let service = start(&store, &dir).await.unwrap();

        for id in [0, -3] {
            assert!(matches!(
                service.get_patient(id).await,
                Err(IngestionError::InvalidInput(ValidationError::InvalidId(_)))
            ));
        }
    }

    #[tokio::test]
    async fn test_get_miss_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let service = start(&store, &dir).await.unwrap();

        assert!(matches!(
            service.get_patient(42).await,
            Err(IngestionError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_get_does_not_see_staged_records() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let service = start(&store, &dir).await.unwrap();

        let created = service.create_patient(ann()).await.unwrap();

        assert!(matches!(
            service.get_patient(created.id as i64).await,
            Err(IngestionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recovers_leftover_batch_before_seeding() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::with_records([record(1)]));
        let mut leftover = StagingBatch::create(dir.path()).unwrap();
        leftover.append(record(2)).unwrap();
        leftover.append(record(3)).unwrap();
        let leftover_path = leftover.seal().path().to_path_buf();

        let service = start(&store, &dir).await.unwrap();

        assert_eq!(store.ids(), vec![1, 2, 3]);
        assert!(!leftover_path.exists());
        assert_eq!(service.create_patient(ann()).await.unwrap().id, 4);
    }

    #[tokio::test]
    async fn test_already_committed_leftover_is_discarded() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::with_records([record(1), record(2)]));
        let mut leftover = StagingBatch::create(dir.path()).unwrap();
        leftover.append(record(2)).unwrap();
        let leftover_path = leftover.seal().path().to_path_buf();

        start(&store, &dir).await.unwrap();

        assert!(!leftover_path.exists());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_recovery_fails_startup_and_keeps_artifact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        store.fail_next_commits(1);
        let mut leftover = StagingBatch::create(dir.path()).unwrap();
        leftover.append(record(1)).unwrap();
        let leftover_path = leftover.seal().path().to_path_buf();

        let result = start(&store, &dir).await;

        assert!(matches!(result, Err(IngestionError::Recovery { .. })));
        assert!(leftover_path.exists());
    }

    #[tokio::test]
    async fn test_empty_leftovers_are_removed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryPatientStore::new());
        let empty = StagingBatch::create(dir.path()).unwrap().seal();

        start(&store, &dir).await.unwrap();

        assert!(!empty.path().exists());
        assert!(store.is_empty());
    }
}
