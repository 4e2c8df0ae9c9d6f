//! Response dispatch loop.
//!
//! One loop per correlator reads the response topic and hands each message to
//! the registry by its key. Completion never blocks, so one slow caller
//! cannot hold up delivery to the others.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::{GatewayError, GatewayResult};
use crate::domain::pending::PendingRequestStore;
use shared_bus::{BusMessage, Subscription};
use shared_types::{ErrorKind, PatientResponse};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Routes response messages to waiting callers.
pub struct ResponseDispatcher {
    pending: Arc<PendingRequestStore>,
    subscription: Subscription,
}

impl ResponseDispatcher {
    pub(crate) fn new(pending: Arc<PendingRequestStore>, subscription: Subscription) -> Self {
        Self {
            pending,
            subscription,
        }
    }

    /// Run until `shutdown` flips to true.
    ///
    /// # Errors
    /// `BusUnavailable` if the response subscription ends first: no caller
    /// could be answered any more.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> GatewayResult<()> {
        info!(topic = self.subscription.topic(), "Response dispatcher started");

        loop {
            tokio::select! {
                message = self.subscription.recv() => match message {
                    Some(message) => {
                        self.dispatch(message);
                    }
                    None => {
                        let topic = self.subscription.topic();
                        error!(topic, "Response subscription ended");
                        return Err(GatewayError::BusUnavailable(format!(
                            "subscription to {topic} ended"
                        )));
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Response dispatcher stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Deliver one response message. Returns true if a waiter received it.
    pub fn dispatch(&self, message: BusMessage) -> bool {
        let correlation_id = match CorrelationId::parse(&message.key) {
            Ok(id) => id,
            Err(e) => {
                warn!(key = %message.key, error = %e, "Dropping response with invalid correlation key");
                return false;
            }
        };

        let response = PatientResponse::decode(&message.payload).unwrap_or_else(|e| {
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                payload = %message.payload_lossy(),
                "Malformed response payload"
            );
            PatientResponse::error(ErrorKind::Serialization, e.to_string())
        });

        let delivered = self.pending.complete(correlation_id, response);
        if !delivered {
            debug!(correlation_id = %correlation_id, "No waiter for response, dropped");
        }
        delivered
    }
}
