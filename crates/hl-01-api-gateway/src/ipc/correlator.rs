//! Request/Response Correlator.
//!
//! Turns the one-way bus into call/response: publish a command keyed by a
//! fresh correlation id, then wait on the registry until the dispatcher
//! delivers the matching response or the deadline passes.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::{GatewayError, GatewayResult};
use crate::domain::pending::PendingRequestStore;
use crate::ipc::dispatcher::ResponseDispatcher;
use shared_bus::{MessagePublisher, MessageSubscriber};
use shared_types::{
    check_patient_id, NewPatient, PatientCommand, PatientRecord, PatientResponse, TopicConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bridges callers onto the bus.
pub struct Correlator {
    /// Correlation registry, owned by this correlator
    pending: Arc<PendingRequestStore>,
    /// Outgoing commands
    publisher: Arc<dyn MessagePublisher>,
    /// Command and response topics
    topics: TopicConfig,
    /// Deadline used when the caller does not give one
    default_timeout: Duration,
    /// Set once the dispatch loop has been handed out
    dispatcher_started: AtomicBool,
}

impl Correlator {
    pub fn new(
        pending: Arc<PendingRequestStore>,
        publisher: Arc<dyn MessagePublisher>,
        topics: TopicConfig,
        default_timeout: Duration,
    ) -> Self {
        Self {
            pending,
            publisher,
            topics,
            default_timeout,
            dispatcher_started: AtomicBool::new(false),
        }
    }

    /// Publish `command` and wait for its correlated response.
    ///
    /// Exactly one of fulfillment or timeout is observed. On timeout the
    /// registry entry is expired, so a late response is dropped.
    pub async fn call(
        &self,
        command: PatientCommand,
        timeout: Option<Duration>,
    ) -> GatewayResult<PatientResponse> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let operation = command.operation();
        let payload = command
            .encode()
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;

        let correlation_id = CorrelationId::new();
        let rx = self.pending.register(correlation_id, operation, timeout)?;

        let topic = self.topics.command_topic(command.kind());
        match self
            .publisher
            .publish(topic, &correlation_id.to_string(), payload)
            .await
        {
            Ok(0) => {
                // Nobody is consuming; the call can only end by timeout.
                warn!(
                    correlation_id = %correlation_id,
                    topic = topic,
                    "Command published with no consumer"
                );
            }
            Ok(_) => {
                debug!(
                    correlation_id = %correlation_id,
                    topic = topic,
                    operation = operation,
                    "Published command"
                );
            }
            Err(e) => {
                self.pending.expire(&correlation_id);
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Command publish failed"
                );
                return Err(GatewayError::BusUnavailable(e.to_string()));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: the cleanup sweep got there first.
            Ok(Err(_)) => Err(GatewayError::Timeout(timeout)),
            Err(_) => {
                self.pending.expire(&correlation_id);
                warn!(
                    correlation_id = %correlation_id,
                    operation = operation,
                    timeout_ms = timeout.as_millis(),
                    "Request timed out"
                );
                Err(GatewayError::Timeout(timeout))
            }
        }
    }

    /// Validate and submit a new patient, returning the record with its id.
    pub async fn create_patient(&self, patient: NewPatient) -> GatewayResult<PatientRecord> {
        patient.validate()?;
        let response = self
            .call(PatientCommand::CreatePatient(patient), None)
            .await?;
        unwrap_response(response)
    }

    /// Look up a patient by id. Ids `<= 0` are rejected without publishing.
    pub async fn get_patient(&self, id: i64) -> GatewayResult<PatientRecord> {
        check_patient_id(id)?;
        let response = self.call(PatientCommand::GetPatient { id }, None).await?;
        unwrap_response(response)
    }

    /// Subscribe to the response topic and hand out the dispatch loop.
    ///
    /// Only one loop may exist per correlator; a second request fails with
    /// `DispatcherAlreadyRunning`. The subscription is taken here, before
    /// any call can publish, so no response can be missed.
    pub fn start_dispatcher(
        &self,
        subscriber: &dyn MessageSubscriber,
    ) -> GatewayResult<ResponseDispatcher> {
        if self
            .dispatcher_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GatewayError::DispatcherAlreadyRunning);
        }

        match subscriber.subscribe(&self.topics.patient_info) {
            Ok(subscription) => Ok(ResponseDispatcher::new(
                Arc::clone(&self.pending),
                subscription,
            )),
            Err(e) => {
                self.dispatcher_started.store(false, Ordering::Release);
                Err(GatewayError::BusUnavailable(e.to_string()))
            }
        }
    }

    /// The correlation registry
    pub fn pending(&self) -> &Arc<PendingRequestStore> {
        &self.pending
    }

    /// Topics this correlator publishes to and listens on
    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }
}

fn unwrap_response(response: PatientResponse) -> GatewayResult<PatientRecord> {
    response
        .into_result()
        .map_err(|(kind, message)| GatewayError::from_response(kind, message))
}
