//! HL-02 Patient Ingestion - assigns ids and batches records into the store.
//!
//! Commands arrive on the bus; creates are answered as soon as the record is
//! staged, and a background scheduler bulk-commits staged batches.
//!
//! # Architecture
//!
//! ```text
//!   createPatient ─┐                              patientInfo
//!   getPatientId ──┴─► CommandConsumer ──────────► (one response per command)
//!                           │
//!                           ▼
//!                  IngestionService (IngestionApi)
//!                     │               │
//!            append   ▼               ▼  find_by_id
//!   ┌──────────────────────┐    ┌──────────────┐
//!   │ BatchBuffer          │    │ PatientStore │
//!   │ Mutex{batch,next_id} │    └──────▲───────┘
//!   └──────────┬───────────┘           │ bulk_commit
//!              │ drain_for_commit      │
//!              └──────► FlushScheduler ┘
//! ```
//!
//! # Durability
//!
//! A create is acknowledged before its batch is committed. If every commit
//! attempt fails until shutdown, the artifact stays in the staging directory
//! and is committed by the next startup before any new id is assigned.
//!
//! # Usage
//!
//! ```ignore
//! use hl_02_patient_ingestion::{IngestionConfig, IngestionWorker, InMemoryPatientStore};
//!
//! let worker = IngestionWorker::start(store, &config, bus.clone(), bus.as_ref()).await?;
//! let report = worker.run(shutdown_rx).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod worker;

pub use adapters::CommandConsumer;
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbPatientStore};
pub use config::IngestionConfig;
pub use domain::{BatchBuffer, BufferSize, IngestionError, SealedBatch, StagingError, StoreError};
pub use ports::{InMemoryPatientStore, IngestionApi, PatientStore};
pub use scheduler::{FlushReport, FlushScheduler};
pub use service::IngestionService;
pub use worker::IngestionWorker;
