//! Correlation Registry - async-to-sync bridge.
//!
//! Maps correlation IDs to callers waiting on a bus response. Every entry is
//! removed exactly once: by `complete`, by `expire`, or by the cleanup sweep.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use shared_types::PatientResponse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// A caller waiting for its response
struct PendingRequest {
    /// Single-use completion slot
    sender: oneshot::Sender<PatientResponse>,
    /// When the call was registered
    created_at: Instant,
    /// After this the entry is eligible for the cleanup sweep
    deadline: Instant,
    /// Operation name (for logging)
    operation: &'static str,
}

/// Statistics for the registry
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total entries registered
    pub registered: AtomicU64,
    /// Total entries completed with a delivered response
    pub completed: AtomicU64,
    /// Total entries expired (caller timeout or sweep)
    pub expired: AtomicU64,
    /// Responses with no live waiter
    pub dropped_late: AtomicU64,
}

/// Point-in-time view of the registry, served by the admin route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    pub pending: usize,
    pub registered: u64,
    pub completed: u64,
    pub expired: u64,
    pub dropped_late: u64,
}

/// Correlation registry.
///
/// Flow:
/// 1. Correlator generates a CorrelationId
/// 2. Correlator calls `register()` to get a oneshot receiver
/// 3. Correlator publishes the command keyed by the CorrelationId
/// 4. Dispatcher receives the response and calls `complete()`
/// 5. Correlator awaits the receiver or times out and calls `expire()`
///
/// `complete` never blocks: the oneshot slot is buffered, so a slow waiter
/// cannot stall the dispatcher.
pub struct PendingRequestStore {
    /// Map of correlation ID to waiting caller
    pending: DashMap<CorrelationId, PendingRequest>,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl PendingRequestStore {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a waiter for `correlation_id`.
    ///
    /// Fails with `DuplicateId` if the id is already waiting; random ids make
    /// that practically impossible, but it is still checked.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        operation: &'static str,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<PatientResponse>, RegistryError> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        match self.pending.entry(correlation_id) {
            Entry::Occupied(_) => return Err(RegistryError::DuplicateId(correlation_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    sender: tx,
                    created_at: now,
                    deadline: now + timeout,
                    operation,
                });
            }
        }
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            operation = operation,
            "Registered pending request"
        );

        Ok(rx)
    }

    /// Deliver a response to the waiter for `correlation_id`.
    ///
    /// Returns true if a live waiter received it. Unknown, already completed,
    /// expired or abandoned ids return false and have no other effect.
    pub fn complete(&self, correlation_id: CorrelationId, response: PatientResponse) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            self.stats.dropped_late.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                "Response for unknown or expired correlation ID"
            );
            return false;
        };

        let response_time = pending.created_at.elapsed();
        match pending.sender.send(response) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = pending.operation,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped (caller went away)
                self.stats.dropped_late.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = pending.operation,
                    "Pending request receiver dropped"
                );
                false
            }
        }
    }

    /// Remove the entry for `correlation_id` if still present.
    ///
    /// Idempotent: returns false when the entry was already completed or
    /// expired.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        match self.pending.remove(correlation_id) {
            Some((_, pending)) => {
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = pending.operation,
                    elapsed_ms = pending.created_at.elapsed().as_millis(),
                    "Expired pending request"
                );
                true
            }
            None => false,
        }
    }

    /// Remove entries whose deadline has passed (TTL cleanup).
    ///
    /// Catches waiters whose caller vanished without expiring them.
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, request| {
            if now >= request.deadline {
                warn!(
                    correlation_id = %id,
                    operation = request.operation,
                    elapsed_ms = now.duration_since(request.created_at).as_millis(),
                    "Removing expired pending request"
                );
                removed += 1;
                false // Remove
            } else {
                true // Keep
            }
        });

        if removed > 0 {
            self.stats
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Count and statistics in one serializable value
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            pending: self.pending_count(),
            registered: self.stats.registered.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            dropped_late: self.stats.dropped_late.load(Ordering::Relaxed),
        }
    }
}

impl Default for PendingRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task to clean up expired entries, until shutdown is signalled.
pub async fn cleanup_task(
    store: Arc<PendingRequestStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cleanup_interval.tick() => {
                let removed = store.remove_expired();
                if removed > 0 {
                    debug!(removed = removed, "Cleaned up expired pending requests");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Pending request cleanup stopped");
                    return;
                }
            }
        }
    }
}
