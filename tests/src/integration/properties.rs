//! System-wide properties: id uniqueness, correlation safety and the
//! durability guarantees of the staging pipeline.

use super::harness::{ann, staged_rows, Harness};
use hl_01_api_gateway::{CorrelationId, PendingRequestStore};
use hl_02_patient_ingestion::domain::StagingBatch;
use hl_02_patient_ingestion::{
    FlushScheduler, InMemoryPatientStore, IngestionApi, IngestionConfig, IngestionService,
    PatientStore,
};
use shared_types::{ErrorKind, PatientResponse};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_contiguous_unique_ids() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let correlator = Arc::clone(&harness.correlator);
        handles.push(tokio::spawn(async move {
            correlator.create_patient(ann()).await
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.sort_unstable();

    assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    assert_eq!(harness.correlator.pending().pending_count(), 0);

    harness.shutdown().await;
    assert_eq!(staged_rows(dir.path()), 0);
}

#[tokio::test]
async fn test_completion_reaches_only_its_own_waiter() {
    let store = PendingRequestStore::new();
    let x = CorrelationId::new();
    let y = CorrelationId::new();
    let mut rx_x = store.register(x, "get_patient", Duration::from_secs(5)).unwrap();
    let mut rx_y = store.register(y, "get_patient", Duration::from_secs(5)).unwrap();

    // Unknown ids are a silent no-op.
    assert!(!store.complete(CorrelationId::new(), PatientResponse::ok(ann().into_record(9))));

    assert!(store.complete(x, PatientResponse::ok(ann().into_record(1))));
    assert_eq!(rx_x.try_recv().unwrap(), PatientResponse::ok(ann().into_record(1)));
    assert!(rx_y.try_recv().is_err());

    // Second completion of the same id is dropped.
    assert!(!store.complete(x, PatientResponse::error(ErrorKind::Internal, "late")));
    assert!(store.is_pending(&y));
    assert_eq!(store.snapshot().dropped_late, 2);
}

#[tokio::test]
async fn test_failed_commit_keeps_records_for_next_attempt() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::new());
    let config = IngestionConfig::for_testing(dir.path());
    let service = IngestionService::start(Arc::clone(&store) as Arc<dyn PatientStore>, &config)
        .await
        .unwrap();
    let mut scheduler = FlushScheduler::new(service.buffer(), service.store(), &config);
    for _ in 0..5 {
        service.create_patient(ann()).await.unwrap();
    }

    store.fail_next_commits(1);
    let failed = scheduler.flush_once().await;

    assert_eq!(failed.failed_batches, 1);
    assert!(store.is_empty());
    assert_eq!(staged_rows(dir.path()), 5);
    assert_eq!(scheduler.retry_len(), 1);

    // Appends after the failure land in the next batch.
    service.create_patient(ann()).await.unwrap();
    let retried = scheduler.flush_once().await;

    assert_eq!(retried.committed_batches, 2);
    assert_eq!(retried.committed_records, 6);
    assert_eq!(store.ids(), (1..=6).collect::<Vec<_>>());
    assert_eq!(staged_rows(dir.path()), 0);
}

#[tokio::test]
async fn test_failed_commit_is_retried_by_the_running_worker() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::new());
    store.fail_next_commits(2);
    let harness = Harness::start(dir.path(), Arc::clone(&store), |config| {
        config.flush_threshold_records = 5;
    })
    .await;

    for _ in 0..5 {
        harness.correlator.create_patient(ann()).await.unwrap();
    }
    harness.wait_for_committed(5).await;

    let report = harness.shutdown().await;
    assert_eq!(store.ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(report.committed_records, 5);
    assert_eq!(report.failed_batches, 2);
}

#[tokio::test]
async fn test_shutdown_commits_everything_acknowledged() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::new());
    let harness = Harness::start(dir.path(), Arc::clone(&store), |_| {}).await;

    for _ in 0..7 {
        harness.correlator.create_patient(ann()).await.unwrap();
    }
    assert!(store.is_empty());

    let report = harness.shutdown().await;

    assert_eq!(report.committed_records, 7);
    assert_eq!(store.ids(), (1..=7).collect::<Vec<_>>());
    assert_eq!(staged_rows(dir.path()), 0);
}

#[tokio::test]
async fn test_restart_commits_leftover_batch_before_serving() {
    let dir = TempDir::new().unwrap();
    {
        // A batch staged by a process that died before committing.
        let mut batch = StagingBatch::create(dir.path()).unwrap();
        for id in 1..=3 {
            batch.append(ann().into_record(id)).unwrap();
        }
    }
    let store = Arc::new(InMemoryPatientStore::new());

    let harness = Harness::start(dir.path(), Arc::clone(&store), |_| {}).await;

    assert_eq!(store.ids(), vec![1, 2, 3]);
    let record = harness.correlator.create_patient(ann()).await.unwrap();
    assert_eq!(record.id, 4);

    harness.shutdown().await;
    assert_eq!(store.ids(), vec![1, 2, 3, 4]);
}
