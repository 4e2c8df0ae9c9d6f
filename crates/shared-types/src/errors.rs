//! # Error Types
//!
//! Error taxonomy shared by the gateway and the ingestion worker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories carried inside an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed command payload or id <= 0.
    InvalidInput,
    /// Lookup miss.
    NotFound,
    /// No response within the caller's deadline.
    Timeout,
    /// Malformed bus payload.
    Serialization,
    /// The store rejected a read or a commit.
    StoreFailure,
    /// Publish or subscribe failed.
    BusUnavailable,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name, matching the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Serialization => "serialization",
            ErrorKind::StoreFailure => "store_failure",
            ErrorKind::BusUnavailable => "bus_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a patient payload or id is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required text field is empty or absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Date of birth is neither `YYYY-MM-DD` nor RFC 3339.
    #[error("invalid date_of_birth: {0:?}")]
    InvalidDate(String),

    /// Blood type code outside 1..=4.
    #[error("invalid blood_type: {0}")]
    InvalidBloodType(u8),

    /// Rh factor other than `+` / `-`.
    #[error("invalid rh_factor: {0:?}")]
    InvalidRhFactor(String),

    /// Non-numeric or non-positive patient id.
    #[error("invalid patient id: {0}")]
    InvalidId(String),
}

/// Failure to encode or decode a bus payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Payload is not valid JSON for the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Payload bytes are not UTF-8 text.
    #[error("payload is not utf-8")]
    NotUtf8,
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        EnvelopeError::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_name_matches_display() {
        for kind in [
            ErrorKind::InvalidInput,
            ErrorKind::NotFound,
            ErrorKind::Timeout,
            ErrorKind::Serialization,
            ErrorKind::StoreFailure,
            ErrorKind::BusUnavailable,
            ErrorKind::Internal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
