//! # Message Publisher
//!
//! Defines the publishing side of the bus and the in-memory implementation.

use crate::message::BusMessage;
use crate::subscriber::{MessageSubscriber, Subscription};
use crate::{BusError, DEFAULT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `payload` on `topic` under `key`.
    ///
    /// Waits while any subscriber's queue is full, so a slow consumer slows
    /// its publishers down instead of losing messages.
    ///
    /// # Returns
    ///
    /// The number of live subscribers that received the message. Zero is not
    /// an error: nobody is consuming the topic right now.
    ///
    /// # Errors
    ///
    /// `BusError::Closed` once the bus has been shut down.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<usize, BusError>;

    /// Total publish attempts accepted by the bus.
    fn messages_published(&self) -> u64;
}

/// Subscriber queues of one topic.
struct TopicChannel {
    name: Arc<str>,
    subscribers: Vec<mpsc::Sender<BusMessage>>,
}

/// In-memory implementation of the bus.
///
/// Every subscription owns a bounded `tokio::sync::mpsc` queue; publishing
/// pushes a copy into each queue of the topic and waits for room. Like a
/// broker consumer that starts at the newest offset, a subscriber only sees
/// messages published after it subscribed.
pub struct InMemoryMessageBus {
    /// Topic name to subscriber queues.
    topics: RwLock<HashMap<String, TopicChannel>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Set once by `close()`.
    closed: AtomicBool,

    /// Per-subscriber queue capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with the given per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Get the per-subscriber queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, |channel| {
            channel
                .subscribers
                .iter()
                .filter(|sender| !sender.is_closed())
                .count()
        })
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the bus down.
    ///
    /// Further publish/subscribe calls fail with `BusError::Closed`; existing
    /// subscriptions drain what is already queued and then end.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = {
            let mut topics = self.topics.write();
            let count = topics.len();
            topics.clear();
            count
        };
        info!(topics = dropped, "Message bus closed");
    }

    /// Live subscriber queues of `topic`, pruning the ones whose
    /// subscription was dropped.
    fn senders(&self, topic: &str) -> Option<(Arc<str>, Vec<mpsc::Sender<BusMessage>>)> {
        let mut topics = self.topics.write();
        let channel = topics.get_mut(topic)?;
        channel.subscribers.retain(|sender| !sender.is_closed());
        Some((Arc::clone(&channel.name), channel.subscribers.clone()))
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<usize, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let Some((name, senders)) = self.senders(topic).filter(|(_, s)| !s.is_empty()) else {
            warn!(topic = topic, key = key, "Message dropped (no subscribers)");
            return Ok(0);
        };

        let message = BusMessage::new(name, key, payload);
        let mut receivers = 0;
        for sender in senders {
            // A subscription dropped mid-publish simply misses the message.
            if sender.send(message.clone()).await.is_ok() {
                receivers += 1;
            }
        }
        debug!(topic = topic, key = key, receivers = receivers, "Message published");
        Ok(receivers)
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl MessageSubscriber for InMemoryMessageBus {
    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let name = {
            let mut topics = self.topics.write();
            // Checked under the lock so a concurrent close() cannot miss us.
            if self.is_closed() {
                return Err(BusError::Closed);
            }
            let channel = topics.entry(topic.to_string()).or_insert_with(|| {
                debug!(topic = topic, "Topic created");
                TopicChannel {
                    name: Arc::from(topic),
                    subscribers: Vec::new(),
                }
            });
            channel.subscribers.push(sender);
            Arc::clone(&channel.name)
        };
        debug!(topic = topic, "New subscription created");
        Ok(Subscription::new(receiver, name))
    }
}
