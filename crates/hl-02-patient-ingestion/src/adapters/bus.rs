//! Command consumer adapter.
//!
//! Reads `createPatient` and `getPatientId` commands off the bus, drives the
//! inbound API and publishes exactly one `PatientResponse` per command to the
//! response topic, keyed by the command's correlation key.
//!
//! Delivery is at-least-once and creates carry no idempotency key: a create
//! delivered twice is staged twice under two ids. Repeated keys are logged so
//! the gap is visible, but not deduplicated.

use crate::domain::IngestionError;
use crate::ports::inbound::IngestionApi;
use shared_bus::{BusMessage, MessagePublisher, MessageSubscriber, Subscription};
use shared_types::{CommandKind, ErrorKind, PatientCommand, PatientResponse, TopicConfig};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Create keys remembered for duplicate-delivery warnings.
const RECENT_KEYS_CAPACITY: usize = 4096;

/// Consumes commands until shutdown or until the bus goes away.
pub struct CommandConsumer {
    handler: CommandHandler,
    creates: Subscription,
    gets: Subscription,
}

impl CommandConsumer {
    /// Subscribe to both command topics.
    ///
    /// Subscribing here rather than in `run` means commands published after
    /// construction are never missed.
    pub fn new(
        api: Arc<dyn IngestionApi>,
        publisher: Arc<dyn MessagePublisher>,
        subscriber: &dyn MessageSubscriber,
        topics: &TopicConfig,
    ) -> Result<Self, IngestionError> {
        let creates = subscriber
            .subscribe(&topics.create_patient)
            .map_err(|e| IngestionError::BusUnavailable(e.to_string()))?;
        let gets = subscriber
            .subscribe(&topics.get_patient)
            .map_err(|e| IngestionError::BusUnavailable(e.to_string()))?;

        Ok(Self {
            handler: CommandHandler {
                api,
                publisher,
                response_topic: topics.patient_info.clone(),
                recent_creates: RecentKeys::new(RECENT_KEYS_CAPACITY),
            },
            creates,
            gets,
        })
    }

    /// Process commands until `shutdown` flips to true.
    ///
    /// # Errors
    /// `BusUnavailable` if a subscription ends or a response cannot be
    /// published. The loop cannot make progress without the bus.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), IngestionError> {
        let Self {
            mut handler,
            mut creates,
            mut gets,
        } = self;

        info!(
            create_topic = creates.topic(),
            get_topic = gets.topic(),
            "Command consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                message = creates.recv() => match message {
                    Some(message) => handler.handle(CommandKind::Create, message).await?,
                    None => return Err(subscription_ended(creates.topic())),
                },
                message = gets.recv() => match message {
                    Some(message) => handler.handle(CommandKind::Get, message).await?,
                    None => return Err(subscription_ended(gets.topic())),
                },
            }
        }

        info!("Command consumer stopped");
        Ok(())
    }
}

fn subscription_ended(topic: &str) -> IngestionError {
    error!(topic, "Command subscription ended");
    IngestionError::BusUnavailable(format!("subscription to {topic} ended"))
}

struct CommandHandler {
    api: Arc<dyn IngestionApi>,
    publisher: Arc<dyn MessagePublisher>,
    response_topic: String,
    recent_creates: RecentKeys,
}

impl CommandHandler {
    async fn handle(&mut self, kind: CommandKind, message: BusMessage) -> Result<(), IngestionError> {
        let response = match PatientCommand::decode(kind, &message.payload[..]) {
            Ok(command) => self.execute(command, &message.key).await,
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    key = %message.key,
                    payload = %message.payload_lossy(),
                    error = %e,
                    "Undecodable command"
                );
                PatientResponse::error(ErrorKind::Serialization, e.to_string())
            }
        };

        let payload = match response.encode() {
            Ok(payload) => payload,
            Err(e) => {
                // The caller resolves through its deadline.
                error!(key = %message.key, error = %e, "Failed to encode response");
                return Ok(());
            }
        };

        let delivered = self
            .publisher
            .publish(&self.response_topic, &message.key, payload)
            .await
            .map_err(|e| IngestionError::BusUnavailable(e.to_string()))?;
        if delivered == 0 {
            debug!(key = %message.key, "Response published with no listener");
        }
        Ok(())
    }

    async fn execute(&mut self, command: PatientCommand, key: &str) -> PatientResponse {
        let operation = command.operation();
        let result = match command {
            PatientCommand::CreatePatient(patient) => {
                if !self.recent_creates.insert(key) {
                    warn!(
                        key,
                        "Create delivered more than once; staging it again under a new id"
                    );
                }
                self.api.create_patient(patient).await
            }
            PatientCommand::GetPatient { id } => self.api.get_patient(id).await,
        };

        match result {
            Ok(record) => {
                debug!(key, operation, id = record.id, "Command succeeded");
                PatientResponse::ok(record)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::NotFound | ErrorKind::InvalidInput => {
                        debug!(key, operation, error = %e, "Command rejected")
                    }
                    _ => warn!(key, operation, error = %e, "Command failed"),
                }
                PatientResponse::error(e.kind(), e.to_string())
            }
        }
    }
}

/// Bounded set of recently seen keys, oldest evicted first.
struct RecentKeys {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentKeys {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false if `key` was already present.
    fn insert(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }
}
