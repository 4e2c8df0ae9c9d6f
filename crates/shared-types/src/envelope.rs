//! # Bus Envelopes
//!
//! Commands travel gateway → worker, responses travel worker → gateway.
//! Both are keyed on the bus by the caller's correlation id; the id itself
//! never appears inside the payload.
//!
//! ## Wire Format
//!
//! | Message | Topic | Value |
//! |---------|-------|-------|
//! | `CreatePatient` | `createPatient` | JSON `NewPatient` |
//! | `GetPatient` | `getPatientId` | decimal text of the id |
//! | `PatientResponse::Ok` | `patientInfo` | `{"status":"ok","id":1,"name":"...",...}` |
//! | `PatientResponse::Err` | `patientInfo` | `{"status":"error","kind":"...","error":"..."}` |

use crate::entities::{NewPatient, PatientRecord};
use crate::errors::{EnvelopeError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Which command a topic carries. The command discriminant is the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Get,
}

/// A command published by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientCommand {
    /// Assign an id and stage the record.
    CreatePatient(NewPatient),
    /// Point lookup. Kept signed so that non-positive ids can be represented
    /// and rejected by the worker rather than failing to decode.
    GetPatient { id: i64 },
}

impl PatientCommand {
    /// Discriminant used to pick the topic.
    pub fn kind(&self) -> CommandKind {
        match self {
            PatientCommand::CreatePatient(_) => CommandKind::Create,
            PatientCommand::GetPatient { .. } => CommandKind::Get,
        }
    }

    /// Operation name for logs.
    pub fn operation(&self) -> &'static str {
        match self {
            PatientCommand::CreatePatient(_) => "create_patient",
            PatientCommand::GetPatient { .. } => "get_patient",
        }
    }

    /// Encode the command value for the bus.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        match self {
            PatientCommand::CreatePatient(patient) => Ok(serde_json::to_vec(patient)?),
            PatientCommand::GetPatient { id } => Ok(id.to_string().into_bytes()),
        }
    }

    /// Decode a command value received on a topic of the given kind.
    pub fn decode(kind: CommandKind, payload: &[u8]) -> Result<Self, EnvelopeError> {
        match kind {
            CommandKind::Create => Ok(PatientCommand::CreatePatient(serde_json::from_slice(
                payload,
            )?)),
            CommandKind::Get => {
                let text = std::str::from_utf8(payload).map_err(|_| EnvelopeError::NotUtf8)?;
                let id = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| EnvelopeError::Malformed(format!("{text:?}: {e}")))?;
                Ok(PatientCommand::GetPatient { id })
            }
        }
    }
}

/// The single response envelope for both commands.
///
/// A success carries the record's fields flat beside the `status` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatientResponse {
    Ok(PatientRecord),
    Error {
        kind: ErrorKind,
        #[serde(rename = "error")]
        message: String,
    },
}

impl PatientResponse {
    pub fn ok(patient: PatientRecord) -> Self {
        PatientResponse::Ok(patient)
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        PatientResponse::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PatientResponse::Ok(_))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Convert into a plain `Result`, for callers that only need the record.
    pub fn into_result(self) -> Result<PatientRecord, (ErrorKind, String)> {
        match self {
            PatientResponse::Ok(patient) => Ok(patient),
            PatientResponse::Error { kind, message } => Err((kind, message)),
        }
    }
}
