//! Gateway error types.
//!
//! `GatewayError` is what a caller of the correlator sees. Each variant maps
//! onto one `ErrorKind`, which in turn picks the HTTP status.

use crate::domain::correlation::CorrelationId;
use shared_types::{ErrorKind, ValidationError};
use std::time::Duration;

/// Correlation registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An entry with this id is already waiting
    #[error("correlation id already registered: {0}")]
    DuplicateId(CorrelationId),
}

/// Gateway-level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Rejected before anything was published
    #[error("{0}")]
    InvalidInput(String),

    /// Lookup miss reported by the worker
    #[error("{0}")]
    NotFound(String),

    /// No response within the caller's deadline
    #[error("failed to get response within {0:?}")]
    Timeout(Duration),

    /// Response payload could not be decoded
    #[error("malformed response: {0}")]
    Serialization(String),

    /// The worker's store rejected the operation
    #[error("{0}")]
    StoreFailure(String),

    /// Publishing the command failed
    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    /// A second dispatch loop was requested for the same correlator
    #[error("response dispatcher already running")]
    DispatcherAlreadyRunning,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Error category, as carried in response envelopes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::Serialization(_) => ErrorKind::Serialization,
            GatewayError::StoreFailure(_) => ErrorKind::StoreFailure,
            GatewayError::BusUnavailable(_) => ErrorKind::BusUnavailable,
            GatewayError::DispatcherAlreadyRunning
            | GatewayError::Config(_)
            | GatewayError::Bind(_)
            | GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild the error carried by an `Error` response envelope.
    pub fn from_response(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::InvalidInput => GatewayError::InvalidInput(message),
            ErrorKind::NotFound => GatewayError::NotFound(message),
            ErrorKind::Serialization => GatewayError::Serialization(message),
            ErrorKind::StoreFailure => GatewayError::StoreFailure(message),
            ErrorKind::BusUnavailable => GatewayError::BusUnavailable(message),
            // The worker never reports a timeout; treat one as opaque.
            ErrorKind::Timeout | ErrorKind::Internal => GatewayError::Internal(message),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(e: ValidationError) -> Self {
        GatewayError::InvalidInput(e.to_string())
    }
}

impl From<RegistryError> for GatewayError {
    fn from(e: RegistryError) -> Self {
        GatewayError::Internal(e.to_string())
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
