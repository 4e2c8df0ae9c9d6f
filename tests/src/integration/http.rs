//! The relay through its HTTP router.

use super::harness::Harness;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hl_02_patient_ingestion::InMemoryPatientStore;
use shared_bus::MessagePublisher;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ANN: &str =
    r#"{"name":"Ann","last_name":"Li","date_of_birth":"1990-01-01","blood_type":2,"rh_factor":"+"}"#;

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_patient(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/patients")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_post_then_get_after_shutdown_flush() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryPatientStore::new());
    let harness = Harness::start(dir.path(), Arc::clone(&store), |config| {
        config.flush_threshold_records = 1;
    })
    .await;

    let response = harness.router.clone().oneshot(post_patient(ANN)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["id"], 1);
    assert_eq!(created["rh_factor"], "+");

    harness.wait_for_committed(1).await;
    let response = harness.router.clone().oneshot(get("/patients/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Ann");

    harness.shutdown().await;
}

#[tokio::test]
async fn test_missing_patient_maps_to_400_with_error_body() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    let response = harness.router.clone().oneshot(get("/patients/42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("42"));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_rejected_requests_publish_nothing() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    for request in [
        get("/patients/0"),
        get("/patients/-3"),
        get("/patients/abc"),
        post_patient(r#"{"name":"Ann"}"#),
        post_patient(r#"{"name":"Ann","last_name":"Li","date_of_birth":"1990-01-01","blood_type":9,"rh_factor":"+"}"#),
        post_patient("{not json"),
    ] {
        let uri = request.uri().to_string();
        let response = harness.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(body_json(response).await["error"].is_string(), "{uri}");
    }
    assert_eq!(harness.bus.messages_published(), 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_admin_pending_counts_completed_calls() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::start(dir.path(), Arc::new(InMemoryPatientStore::new()), |_| {}).await;

    for _ in 0..3 {
        let response = harness.router.clone().oneshot(post_patient(ANN)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response = harness.router.clone().oneshot(get("/admin/pending")).await.unwrap();

    let body = body_json(response).await;
    assert_eq!(body["pending"], 0);
    assert_eq!(body["registered"], 3);
    assert_eq!(body["completed"], 3);

    harness.shutdown().await;
}
