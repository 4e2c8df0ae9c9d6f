//! # Bus Message
//!
//! What a subscriber receives: the topic, the key the publisher chose, and
//! the opaque payload bytes.

use std::sync::Arc;
use std::time::Instant;

/// A single message as seen by subscribers.
///
/// The payload is reference counted because publishing clones every message
/// once per subscriber queue.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Topic the message was published to.
    pub topic: Arc<str>,
    /// Publisher-chosen key (a correlation id for this system).
    pub key: String,
    /// Opaque payload.
    pub payload: Arc<[u8]>,
    /// When the bus accepted the message.
    pub published_at: Instant,
}

impl BusMessage {
    pub fn new(topic: Arc<str>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic,
            key: key.into(),
            payload: payload.into(),
            published_at: Instant::now(),
        }
    }

    /// Payload as UTF-8, for logging.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
