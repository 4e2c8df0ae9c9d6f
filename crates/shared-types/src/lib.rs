//! # Shared Types Crate
//!
//! This crate contains the patient entities, the command/response envelopes
//! and the topic names used by both halves of the relay.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every type that crosses the bus is defined here.
//! - **One Envelope Shape**: Responses are a single tagged `PatientResponse`,
//!   success and failure alike, so no consumer has to guess the payload shape.
//! - **Validate at the Edge**: `NewPatient::validate` is the one validation
//!   routine; the gateway runs it before publishing and the worker runs it
//!   again before assigning an id.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod topics;

pub use entities::*;
pub use envelope::{CommandKind, PatientCommand, PatientResponse};
pub use errors::*;
pub use topics::TopicConfig;
