//! Ports layer (hexagonal architecture).
//!
//! - `inbound`: the API the command consumer drives
//! - `outbound`: the Store Adapter the service and scheduler depend on

pub mod inbound;
pub mod outbound;

pub use inbound::IngestionApi;
pub use outbound::{InMemoryPatientStore, PatientStore};
