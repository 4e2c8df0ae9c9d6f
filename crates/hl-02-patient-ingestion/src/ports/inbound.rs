//! # Inbound Port - IngestionApi
//!
//! Driving port exposed to the command consumer.
//!
//! | Method | Bus topic |
//! |--------|-----------|
//! | `create_patient` | `createPatient` |
//! | `get_patient` | `getPatientId` |

use crate::domain::IngestionError;
use async_trait::async_trait;
use shared_types::{NewPatient, PatientRecord};

/// Primary API of the ingestion worker.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Validate, assign the next id and stage the record.
    ///
    /// Returns as soon as the record is staged; it is not yet in the store.
    ///
    /// # Errors
    /// - `InvalidInput`: a field is missing or malformed; no id is consumed
    /// - `Staging`: the row could not be written; no id is consumed
    async fn create_patient(&self, patient: NewPatient) -> Result<PatientRecord, IngestionError>;

    /// Point lookup against the store. Staged records are not visible.
    ///
    /// # Errors
    /// - `InvalidInput`: `id <= 0`
    /// - `NotFound`: no committed record with this id
    /// - `Store`: the lookup failed
    async fn get_patient(&self, id: i64) -> Result<PatientRecord, IngestionError>;
}
