//! # Shared Bus - Message Bus Gateway
//!
//! The only channel between the API gateway and the ingestion worker.
//!
//! ## Contract
//!
//! - `publish(topic, key, payload)` delivers to every live subscriber of `topic`.
//! - `subscribe(topic)` yields a `Subscription` of `{key, payload}` messages.
//! - Delivery is at-least-once from the point of view of consumers; nothing
//!   above this crate may assume exactly-once.
//!
//! ```text
//! ┌──────────────┐   publish(createPatient)   ┌──────────────┐
//! │   Gateway    │ ─────────┐                 │   Ingestion  │
//! │              │          ▼                 │    Worker    │
//! └──────────────┘    ┌──────────────┐        └──────────────┘
//!        ↑            │  Message Bus │ ──────────────↑
//!        └─────────── │              │ ←─────────────┘
//!   subscribe(        └──────────────┘   publish(patientInfo)
//!     patientInfo)
//! ```
//!
//! `InMemoryMessageBus` is the single-process implementation; a broker-backed
//! one (Kafka, NATS) only has to implement the two traits.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use message::BusMessage;
pub use publisher::{InMemoryMessageBus, MessagePublisher};
pub use subscriber::{MessageSubscriber, Subscription};

use thiserror::Error;

/// Messages queued per subscriber before publishers wait for room.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Errors from publish/subscribe operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was closed; no further traffic is possible.
    #[error("message bus closed")]
    Closed,

    /// The transport refused the operation.
    #[error("message bus unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(BusError::Closed.to_string(), "message bus closed");
    }
}
