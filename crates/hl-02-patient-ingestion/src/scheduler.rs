//! Flush Scheduler.
//!
//! One loop evaluates the flush triggers every `tick_interval`:
//!
//! | Trigger | Condition |
//! |---------|-----------|
//! | Interval | `flush_interval` elapsed since the last successful flush |
//! | Size | staged records ≥ `flush_threshold_records`, or staged bytes ≥ `flush_threshold_bytes` |
//! | Retry | a batch from an earlier failed commit is waiting |
//!
//! A flush commits waiting retries first, oldest first, then drains and
//! commits the current batch. A failed batch keeps its artifact and joins the
//! back of the retry queue; nothing is merged or dropped.

use crate::config::IngestionConfig;
use crate::domain::{drain_blocking, BatchBuffer, SealedBatch, StoreError};
use crate::ports::outbound::PatientStore;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Outcome of one or more flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub committed_batches: usize,
    pub committed_records: usize,
    pub failed_batches: usize,
}

impl FlushReport {
    fn merge(&mut self, other: FlushReport) {
        self.committed_batches += other.committed_batches;
        self.committed_records += other.committed_records;
        self.failed_batches += other.failed_batches;
    }
}

/// Drives batches from the buffer into the store.
pub struct FlushScheduler {
    buffer: Arc<BatchBuffer>,
    store: Arc<dyn PatientStore>,
    flush_interval: Duration,
    tick_interval: Duration,
    threshold_records: usize,
    threshold_bytes: Option<u64>,
    retry: VecDeque<SealedBatch>,
    last_flush: Instant,
    totals: FlushReport,
}

impl FlushScheduler {
    pub fn new(
        buffer: Arc<BatchBuffer>,
        store: Arc<dyn PatientStore>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            buffer,
            store,
            flush_interval: config.flush_interval,
            tick_interval: config.tick_interval,
            threshold_records: config.flush_threshold_records,
            threshold_bytes: config.flush_threshold_bytes,
            retry: VecDeque::new(),
            last_flush: Instant::now(),
            totals: FlushReport::default(),
        }
    }

    /// True if any trigger fires.
    pub fn should_flush(&self) -> bool {
        if !self.retry.is_empty() {
            return true;
        }
        let size = self.buffer.size();
        if size.records >= self.threshold_records {
            return true;
        }
        if self.threshold_bytes.is_some_and(|limit| size.bytes >= limit) {
            return true;
        }
        self.last_flush.elapsed() >= self.flush_interval
    }

    /// Commit waiting retries, then the current batch.
    pub async fn flush_once(&mut self) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(batch) = self.retry.pop_front() {
            match self.commit(&batch).await {
                Ok(records) => {
                    report.committed_batches += 1;
                    report.committed_records += records;
                    release(batch);
                }
                Err(e) => {
                    warn!(
                        batch = batch.name(),
                        records = batch.len(),
                        error = %e,
                        "Retry commit failed, keeping batch staged"
                    );
                    report.failed_batches += 1;
                    self.retry.push_front(batch);
                    // Later batches wait so commit order follows id order.
                    return self.finish(report);
                }
            }
        }

        match drain_blocking(&self.buffer).await {
            Ok(Some(batch)) => match self.commit(&batch).await {
                Ok(records) => {
                    report.committed_batches += 1;
                    report.committed_records += records;
                    release(batch);
                }
                Err(e) => {
                    warn!(
                        batch = batch.name(),
                        records = batch.len(),
                        error = %e,
                        "Commit failed, batch queued for retry"
                    );
                    report.failed_batches += 1;
                    self.retry.push_back(batch);
                }
            },
            Ok(None) => {}
            Err(e) => {
                // The current batch stays in the buffer and is tried again.
                error!(error = %e, "Failed to rotate staging batch");
                report.failed_batches += 1;
            }
        }

        self.finish(report)
    }

    /// Evaluate triggers every tick until `shutdown` flips to true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            flush_interval = ?self.flush_interval,
            threshold_records = self.threshold_records,
            "Flush scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if self.should_flush() {
                        self.flush_once().await;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Flush scheduler loop stopped");
    }

    /// Last flush before exit, regardless of triggers.
    ///
    /// Every staged batch gets one attempt, failed retries included. Batches
    /// that still fail keep their artifacts on disk; the next startup commits
    /// them before handing out new ids.
    pub async fn final_drain(&mut self) -> FlushReport {
        let mut report = FlushReport::default();

        match drain_blocking(&self.buffer).await {
            Ok(Some(batch)) => self.retry.push_back(batch),
            Ok(None) => {}
            Err(e) => {
                // The rows are already in the accumulating artifact.
                error!(error = %e, "Failed to rotate staging batch at shutdown");
                report.failed_batches += 1;
            }
        }

        let mut remaining = VecDeque::new();
        while let Some(batch) = self.retry.pop_front() {
            match self.commit(&batch).await {
                Ok(records) => {
                    report.committed_batches += 1;
                    report.committed_records += records;
                    release(batch);
                }
                Err(e) => {
                    error!(
                        batch = %batch.path().display(),
                        records = batch.len(),
                        error = %e,
                        "Batch left staged at shutdown"
                    );
                    report.failed_batches += 1;
                    remaining.push_back(batch);
                }
            }
        }
        self.retry = remaining;
        self.totals.merge(report);

        info!(
            committed_batches = report.committed_batches,
            committed_records = report.committed_records,
            left_staged = self.retry.len(),
            "Final drain complete"
        );
        report
    }

    /// Totals across every flush so far.
    pub fn totals(&self) -> FlushReport {
        self.totals
    }

    /// Batches waiting for another commit attempt.
    pub fn retry_len(&self) -> usize {
        self.retry.len()
    }

    async fn commit(&self, batch: &SealedBatch) -> Result<usize, StoreError> {
        let records = self.store.bulk_commit(batch).await?;
        info!(batch = batch.name(), records, "Batch committed");
        Ok(records)
    }

    fn finish(&mut self, report: FlushReport) -> FlushReport {
        if report.failed_batches == 0 {
            self.last_flush = Instant::now();
        }
        self.totals.merge(report);
        report
    }
}

/// Remove a committed batch's artifact.
///
/// A leftover artifact is harmless: startup recovery sees its ids in the
/// store and discards it.
fn release(batch: SealedBatch) {
    if let Err(e) = batch.discard() {
        warn!(error = %e, "Failed to remove committed staging artifact");
    }
}
