//! Staging batches.
//!
//! A batch is a CSV artifact `patients-<uuid>.csv` in the staging directory
//! plus an in-memory copy of its rows. The artifact is what a bulk load
//! consumes (`COPY patients FROM ... CSV HEADER` style): one header row, then
//! one row per record, fields quoted by the `csv` writer when needed.
//!
//! ```text
//! StagingBatch (accumulating) ──seal()──► SealedBatch (committing)
//!                                            │
//!                        commit ok ──────────┤────────── commit failed
//!                            ▼                            ▼
//!                        discard()                 kept for retry
//! ```

use crate::domain::errors::StagingError;
use shared_types::{PatientId, PatientRecord, PATIENT_COLUMNS};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// File name prefix of staging artifacts.
pub const ARTIFACT_PREFIX: &str = "patients-";
/// File name suffix of staging artifacts.
pub const ARTIFACT_SUFFIX: &str = ".csv";

/// A batch still accepting appends.
#[derive(Debug)]
pub struct StagingBatch {
    id: Uuid,
    path: PathBuf,
    file: File,
    records: Vec<PatientRecord>,
    bytes: u64,
}

impl StagingBatch {
    /// Create a fresh artifact in `dir` and write the header row.
    pub fn create(dir: &Path) -> Result<Self, StagingError> {
        let id = Uuid::new_v4();
        let path = dir.join(format!("{ARTIFACT_PREFIX}{id}{ARTIFACT_SUFFIX}"));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StagingError::io(&path, e))?;

        let header = encode_header().map_err(|e| StagingError::csv(&path, e))?;
        file.write_all(&header)
            .map_err(|e| StagingError::io(&path, e))?;

        Ok(Self {
            id,
            path,
            file,
            records: Vec::new(),
            bytes: 0,
        })
    }

    /// Append one record.
    ///
    /// The row is written to the artifact with a single write before the
    /// record is added in memory, so on error neither copy grows.
    pub fn append(&mut self, record: PatientRecord) -> Result<(), StagingError> {
        let row = encode_row(&record).map_err(|e| StagingError::csv(&self.path, e))?;
        self.file
            .write_all(&row)
            .map_err(|e| StagingError::io(&self.path, e))?;
        self.bytes += row.len() as u64;
        self.records.push(record);
        Ok(())
    }

    /// Flush the artifact to disk and freeze the batch.
    ///
    /// A failed fsync is logged, not returned: every row already reached the
    /// file with its own write, and the batch must not be lost from memory.
    pub fn seal(self) -> SealedBatch {
        if let Err(e) = self.file.sync_all() {
            warn!(path = %self.path.display(), error = %e, "Failed to sync staging artifact");
        }
        SealedBatch {
            id: self.id,
            path: self.path,
            records: self.records,
            bytes: self.bytes,
        }
    }

    /// Remove an empty batch's artifact without sealing it.
    pub(crate) fn abandon(self) -> Result<(), StagingError> {
        let Self { path, file, .. } = self;
        drop(file);
        remove_artifact(&path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes of row data appended so far (header excluded).
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A frozen batch handed to the store for bulk commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBatch {
    id: Uuid,
    path: PathBuf,
    records: Vec<PatientRecord>,
    bytes: u64,
}

impl SealedBatch {
    /// Read a batch back from its artifact (startup recovery).
    pub fn load(path: &Path) -> Result<Self, StagingError> {
        let id = artifact_id(path).ok_or_else(|| StagingError::NotAnArtifact(path.to_path_buf()))?;
        let records = read_records(path)?;
        let bytes = fs::metadata(path)
            .map_err(|e| StagingError::io(path, e))?
            .len();
        Ok(Self {
            id,
            path: path.to_path_buf(),
            records,
            bytes,
        })
    }

    /// Remove the artifact. Called only once the batch is committed.
    pub fn discard(self) -> Result<(), StagingError> {
        remove_artifact(&self.path)
    }

    /// Batch id, also embedded in the artifact file name.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Artifact file name, used in logs.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Lowest id in the batch, used to order recovered batches.
    pub fn first_id(&self) -> Option<PatientId> {
        self.records.iter().map(|r| r.id).min()
    }
}

/// Parse every row of a staging artifact.
pub fn read_records(path: &Path) -> Result<Vec<PatientRecord>, StagingError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| StagingError::csv(path, e))?;
    reader
        .deserialize::<PatientRecord>()
        .map(|row| row.map_err(|e| StagingError::csv(path, e)))
        .collect()
}

/// Create the staging directory if needed and return its absolute path.
///
/// Resolved once at startup; the worker and the store both use the result.
pub fn resolve_staging_dir(dir: &Path) -> Result<PathBuf, StagingError> {
    fs::create_dir_all(dir).map_err(|e| StagingError::io(dir, e))?;
    fs::canonicalize(dir).map_err(|e| StagingError::io(dir, e))
}

/// Artifacts left in `dir`, sorted by file name.
pub fn find_artifacts(dir: &Path) -> Result<Vec<PathBuf>, StagingError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StagingError::io(dir, e))? {
        let entry = entry.map_err(|e| StagingError::io(dir, e))?;
        let name = entry.file_name();
        let path = entry.path();
        if artifact_id(&path).is_some() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Batch id encoded in an artifact's file name, `None` for any other file.
fn artifact_id(path: &Path) -> Option<Uuid> {
    let name = path.file_name()?.to_str()?;
    let id = name.strip_prefix(ARTIFACT_PREFIX)?.strip_suffix(ARTIFACT_SUFFIX)?;
    Uuid::parse_str(id).ok()
}

fn remove_artifact(path: &Path) -> Result<(), StagingError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StagingError::io(path, e)),
    }
}

fn encode_header() -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PATIENT_COLUMNS)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

fn encode_row(record: &PatientRecord) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
