//! Ingestion Worker - owns the service, the consume loop and the scheduler.

use crate::adapters::bus::CommandConsumer;
use crate::config::IngestionConfig;
use crate::domain::IngestionError;
use crate::ports::inbound::IngestionApi;
use crate::ports::outbound::PatientStore;
use crate::scheduler::{FlushReport, FlushScheduler};
use crate::service::IngestionService;
use shared_bus::{MessagePublisher, MessageSubscriber};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// One consume loop and one flush loop over a shared batch buffer.
pub struct IngestionWorker {
    service: Arc<IngestionService>,
    consumer: CommandConsumer,
    scheduler: FlushScheduler,
}

impl IngestionWorker {
    /// Recover and seed the service, then subscribe to the command topics.
    pub async fn start(
        store: Arc<dyn PatientStore>,
        config: &IngestionConfig,
        publisher: Arc<dyn MessagePublisher>,
        subscriber: &dyn MessageSubscriber,
    ) -> Result<Self, IngestionError> {
        let service = Arc::new(IngestionService::start(store, config).await?);
        let scheduler = FlushScheduler::new(service.buffer(), service.store(), config);
        let consumer = CommandConsumer::new(
            Arc::clone(&service) as Arc<dyn IngestionApi>,
            publisher,
            subscriber,
            &config.topics,
        )?;

        Ok(Self {
            service,
            consumer,
            scheduler,
        })
    }

    /// The inbound API, for in-process callers.
    pub fn service(&self) -> Arc<IngestionService> {
        Arc::clone(&self.service)
    }

    /// Run until `shutdown` flips to true or the bus fails.
    ///
    /// Either way the consume loop stops first, then the scheduler, then a
    /// final drain commits everything staged.
    ///
    /// # Returns
    /// Flush totals for the worker's lifetime.
    ///
    /// # Errors
    /// `BusUnavailable` from the consume loop, after the final drain.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<FlushReport, IngestionError> {
        let Self {
            consumer,
            mut scheduler,
            ..
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let consume = async move {
            let result = consumer.run(shutdown).await;
            let _ = stop_tx.send(true);
            result
        };

        let (consumed, ()) = tokio::join!(consume, scheduler.run(stop_rx));
        scheduler.final_drain().await;

        let totals = scheduler.totals();
        match consumed {
            Ok(()) => {
                info!(
                    committed_batches = totals.committed_batches,
                    committed_records = totals.committed_records,
                    failed_batches = totals.failed_batches,
                    "Ingestion worker stopped"
                );
                Ok(totals)
            }
            Err(e) => {
                error!(error = %e, "Ingestion worker stopped on fatal error");
                Err(e)
            }
        }
    }
}
