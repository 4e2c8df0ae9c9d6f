//! HTTP surface of the gateway.
//!
//! | Route | Success | Failure |
//! |-------|---------|---------|
//! | `POST /patients` | 201 + record | 400/500 + `{"error": ...}` |
//! | `GET /patients/:id` | 200 + record | 400/500 + `{"error": ...}` |
//! | `GET /health` | 200 | - |
//! | `GET /admin/pending` | 200 + registry snapshot | - |

pub mod cors;

pub use cors::create_cors_layer;

use crate::domain::config::CorsConfig;
use crate::domain::error::GatewayError;
use crate::ipc::correlator::Correlator;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared_types::{ErrorKind, NewPatient, PatientRecord, ValidationError};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    correlator: Arc<Correlator>,
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the patient API router.
pub fn build_router(correlator: Arc<Correlator>, cors: &CorsConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .option_layer(create_cors_layer(cors));

    Router::new()
        .route("/patients", post(create_patient))
        .route("/patients/:id", get(get_patient))
        .route("/health", get(health_check))
        .route("/admin/pending", get(pending_stats))
        .layer(middleware)
        .with_state(AppState { correlator })
}

/// HTTP status for an error category.
///
/// Caller-attributable failures (and the deadline) are 400, as the public
/// contract requires; infrastructure failures are 500.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput
        | ErrorKind::NotFound
        | ErrorKind::Timeout
        | ErrorKind::StoreFailure => StatusCode::BAD_REQUEST,
        ErrorKind::Serialization | ErrorKind::BusUnavailable | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        if status.is_server_error() {
            error!(kind = %self.kind(), error = %self, "Request failed");
        } else {
            debug!(kind = %self.kind(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn create_patient(
    State(state): State<AppState>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> Result<(StatusCode, Json<PatientRecord>), GatewayError> {
    let Json(patient) = payload.map_err(|e| GatewayError::InvalidInput(e.body_text()))?;
    let record = state.correlator.create_patient(patient).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_patient(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<PatientRecord>, GatewayError> {
    let id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| GatewayError::from(ValidationError::InvalidId(raw_id.clone())))?;
    let record = state.correlator.get_patient(id).await?;
    Ok(Json(record))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn pending_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.correlator.pending().snapshot())
}
