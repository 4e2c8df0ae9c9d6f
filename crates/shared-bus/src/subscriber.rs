//! # Message Subscriber
//!
//! Defines the subscription side of the bus.

use crate::message::BusMessage;
use crate::BusError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Trait for subscribing to a topic.
pub trait MessageSubscriber: Send + Sync {
    /// Subscribe to `topic`. Only messages published afterwards are seen.
    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

/// A subscription handle for receiving messages from one topic.
///
/// Messages arrive in publish order and none are skipped; a subscriber that
/// falls behind makes publishers wait.
pub struct Subscription {
    /// This subscriber's queue.
    receiver: mpsc::Receiver<BusMessage>,

    /// Topic this subscription reads.
    topic: Arc<str>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<BusMessage>, topic: Arc<str>) -> Self {
        Self { receiver, topic }
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next message on the topic
    /// - `None` - The bus was closed and the queue is drained
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available
    /// - `Ok(None)` - Nothing queued right now
    /// - `Err(BusError::Closed)` - The bus was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, BusError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }

    /// Topic this subscription reads.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "Subscription dropped");
    }
}
