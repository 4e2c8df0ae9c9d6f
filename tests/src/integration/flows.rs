//! End-to-end request flows through the correlator and the ingestion worker.

use super::harness::{ann, staged_rows, Harness};
use hl_01_api_gateway::{Correlator, GatewayError, PendingRequestStore};
use hl_02_patient_ingestion::InMemoryPatientStore;
use shared_bus::{InMemoryMessageBus, MessagePublisher, MessageSubscriber};
use shared_types::{ErrorKind, PatientRecord, PatientResponse, TopicConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn stored(id: u64) -> PatientRecord {
    let mut record = ann().into_record(id);
    record.name = format!("Stored{id}");
    record
}

#[tokio::test]
async fn test_create_on_empty_store_assigns_id_1() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    let record = harness.correlator.create_patient(ann()).await.unwrap();

    assert_eq!(record, ann().into_record(1));
    // Acknowledged from the staging batch, not yet in the store.
    assert!(harness.store.is_empty());
    assert_eq!(staged_rows(dir.path()), 1);

    let report = harness.shutdown().await;
    assert_eq!(report.committed_records, 1);
}

#[tokio::test]
async fn test_concurrent_creates_continue_after_store_max() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::with_records((1..=5).map(stored)));
    let harness = Harness::start(dir.path(), Arc::clone(&store), |_| {}).await;

    let (a, b) = tokio::join!(
        harness.correlator.create_patient(ann()),
        harness.correlator.create_patient(ann()),
    );

    let ids: HashSet<u64> = [a.unwrap().id, b.unwrap().id].into_iter().collect();
    assert_eq!(ids, HashSet::from([6, 7]));

    harness.shutdown().await;
    assert_eq!(store.ids(), vec![1, 2, 3, 4, 5, 6, 7]);
}

#[tokio::test]
async fn test_invalid_ids_never_reach_the_bus() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    for id in [0, -3] {
        let err = harness.correlator.get_patient(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "id {id}");
    }
    assert_eq!(harness.bus.messages_published(), 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_get_missing_patient_is_not_found() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    let err = harness.correlator.get_patient(42).await.unwrap_err();

    assert!(matches!(err, GatewayError::NotFound(_)));
    assert_eq!(harness.correlator.pending().pending_count(), 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_get_reads_committed_records_only() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::with_records([stored(3)]));
    let harness = Harness::start(dir.path(), store, |_| {}).await;

    let found = harness.correlator.get_patient(3).await.unwrap();
    assert_eq!(found, stored(3));

    // Staged but unflushed records are invisible to lookups.
    let created = harness.correlator.create_patient(ann()).await.unwrap();
    assert_eq!(created.id, 4);
    let err = harness.correlator.get_patient(4).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_record_threshold_commits_and_rotates() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |config| {
        config.flush_threshold_records = 10;
    })
    .await;

    for _ in 0..10 {
        harness.correlator.create_patient(ann()).await.unwrap();
    }
    harness.wait_for_committed(10).await;

    assert_eq!(harness.store.ids(), (1..=10).collect::<Vec<_>>());
    assert_eq!(harness.store.commit_count(), 1);
    assert_eq!(harness.ingestion.buffer().size().records, 0);
    assert_eq!(staged_rows(dir.path()), 0);

    let report = harness.shutdown().await;
    assert_eq!(report.committed_records, 10);
}

#[tokio::test]
async fn test_late_response_after_timeout_is_dropped() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let correlator = Arc::new(Correlator::new(
        Arc::new(PendingRequestStore::new()),
        Arc::clone(&bus) as Arc<dyn MessagePublisher>,
        TopicConfig::default(),
        Duration::from_millis(50),
    ));
    let dispatcher = correlator.start_dispatcher(bus.as_ref()).unwrap();
    let (_tx, rx) = watch::channel(false);
    tokio::spawn(dispatcher.run(rx));
    let mut commands = bus.subscribe("getPatientId").unwrap();

    let err = correlator.get_patient(42).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout(Duration::from_millis(50)));

    let command = commands.recv().await.unwrap();
    let late = PatientResponse::ok(stored(42)).encode().unwrap();
    bus.publish("patientInfo", &command.key, late).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while correlator.pending().snapshot().dropped_late == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("late response was not observed");

    let snapshot = correlator.pending().snapshot();
    assert_eq!(snapshot.pending, 0);
    assert_eq!(snapshot.completed, 0);
    assert_eq!(snapshot.expired, 1);
    assert_eq!(snapshot.dropped_late, 1);
}
