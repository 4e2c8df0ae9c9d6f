//! Batch Buffer.
//!
//! Owns the accumulating staging batch and the id counter behind one mutex.
//! Both critical sections are short: `append` assigns an id and writes one
//! row; `drain_for_commit` only swaps batches. Sealing and committing happen
//! outside the lock, so ingestion never waits on a slow commit.
//!
//! Every method that touches the file system is blocking. Async callers go
//! through [`append_blocking`] and [`drain_blocking`], which run them on the
//! blocking pool.

use crate::domain::errors::StagingError;
use crate::domain::staging::{SealedBatch, StagingBatch};
use parking_lot::Mutex;
use shared_types::{NewPatient, PatientId, PatientRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Current size of the accumulating batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSize {
    pub records: usize,
    pub bytes: u64,
}

struct BufferState {
    current: StagingBatch,
    /// Next id to hand out; only advanced by a successful append.
    next_id: PatientId,
}

/// Rotating staging area for newly created records.
pub struct BatchBuffer {
    staging_dir: PathBuf,
    state: Mutex<BufferState>,
}

impl BatchBuffer {
    /// Open the first batch in `staging_dir`, handing out ids from `next_id`.
    pub fn open(staging_dir: PathBuf, next_id: PatientId) -> Result<Self, StagingError> {
        let current = StagingBatch::create(&staging_dir)?;
        debug!(path = %current.path().display(), next_id, "Opened staging batch");
        Ok(Self {
            staging_dir,
            state: Mutex::new(BufferState { current, next_id }),
        })
    }

    /// Assign the next id to `patient` and stage it.
    ///
    /// The id is consumed only if the row was written.
    pub fn append(&self, patient: NewPatient) -> Result<PatientRecord, StagingError> {
        let mut state = self.state.lock();
        let record = patient.into_record(state.next_id);
        state.current.append(record.clone())?;
        state.next_id += 1;
        Ok(record)
    }

    /// Hand the current batch to the caller and install an empty one.
    ///
    /// Returns `None` when there is nothing to commit.
    pub fn drain_for_commit(&self) -> Result<Option<SealedBatch>, StagingError> {
        if self.state.lock().current.is_empty() {
            return Ok(None);
        }

        // File creation is I/O; keep it out of the critical section.
        let replacement = StagingBatch::create(&self.staging_dir)?;

        let swapped = {
            let mut state = self.state.lock();
            if state.current.is_empty() {
                Err(replacement)
            } else {
                Ok(std::mem::replace(&mut state.current, replacement))
            }
        };

        let batch = match swapped {
            Ok(batch) => batch,
            Err(unused) => {
                // Another drain got there first.
                unused.abandon()?;
                return Ok(None);
            }
        };

        debug!(
            path = %batch.path().display(),
            records = batch.len(),
            "Rotated staging batch"
        );
        Ok(Some(batch.seal()))
    }

    /// Size of the accumulating batch.
    pub fn size(&self) -> BufferSize {
        let state = self.state.lock();
        BufferSize {
            records: state.current.len(),
            bytes: state.current.bytes(),
        }
    }

    /// The id the next append will receive.
    pub fn next_id(&self) -> PatientId {
        self.state.lock().next_id
    }

    /// Absolute staging directory shared with the store.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }
}

/// [`BatchBuffer::append`] on the blocking pool.
pub async fn append_blocking(
    buffer: &Arc<BatchBuffer>,
    patient: NewPatient,
) -> Result<PatientRecord, StagingError> {
    let buffer = Arc::clone(buffer);
    tokio::task::spawn_blocking(move || buffer.append(patient))
        .await
        .map_err(|e| StagingError::Task(e.to_string()))?
}

/// [`BatchBuffer::drain_for_commit`] on the blocking pool.
pub async fn drain_blocking(buffer: &Arc<BatchBuffer>) -> Result<Option<SealedBatch>, StagingError> {
    let buffer = Arc::clone(buffer);
    tokio::task::spawn_blocking(move || buffer.drain_for_commit())
        .await
        .map_err(|e| StagingError::Task(e.to_string()))?
}
