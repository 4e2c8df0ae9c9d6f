//! Ingestion error types.
//!
//! Defines all error conditions for the ingestion worker.

use shared_types::{ErrorKind, PatientId, ValidationError};
use std::path::PathBuf;

/// Failure writing or reading a staging artifact.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Filesystem error on the staging directory or artifact.
    #[error("staging io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding error.
    #[error("staging csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A file in the staging directory whose name carries no batch id.
    #[error("not a staging artifact: {0}")]
    NotAnArtifact(PathBuf),

    /// The blocking task running a staging operation panicked or was cancelled.
    #[error("staging task failed: {0}")]
    Task(String),
}

impl StagingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StagingError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StagingError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Store adapter errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A bulk commit was rejected; nothing from the batch was applied.
    #[error("bulk commit failed: {0}")]
    Commit(String),

    /// A record in the batch already exists in the store.
    #[error("patient id {0} already committed")]
    DuplicateId(PatientId),

    /// Stored bytes could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Ingestion error type.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    /// Command payload or id rejected.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// Lookup miss.
    #[error("patient {0} not found")]
    NotFound(PatientId),

    /// Store read or commit failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Staging artifact could not be written or read.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Leftover artifact from a previous run could not be committed.
    #[error("recovery of {path} failed: {source}")]
    Recovery {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// Publish or subscribe failed; the worker cannot make progress.
    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestionError {
    /// Category reported in the response envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::InvalidInput(_) => ErrorKind::InvalidInput,
            IngestionError::NotFound(_) => ErrorKind::NotFound,
            IngestionError::Store(_)
            | IngestionError::Staging(_)
            | IngestionError::Recovery { .. } => ErrorKind::StoreFailure,
            IngestionError::BusUnavailable(_) => ErrorKind::BusUnavailable,
            IngestionError::Config(_) => ErrorKind::Internal,
        }
    }

    /// True for errors that stop the worker rather than a single command.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestionError::BusUnavailable(_)
                | IngestionError::Recovery { .. }
                | IngestionError::Config(_)
        )
    }
}
