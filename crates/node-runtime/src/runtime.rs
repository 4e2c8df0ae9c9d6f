//! # Node Runtime
//!
//! Runs the gateway and the ingestion worker over one in-memory bus.
//!
//! ## Startup Sequence
//!
//! 1. Open the store
//! 2. Start ingestion (recover leftover batches, seed ids, subscribe)
//! 3. Start the gateway (subscribe to responses, bind HTTP)
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown: HTTP stops accepting, the consume loop stops
//! 2. Await the worker's final drain
//! 3. Await the gateway; in-flight calls resolve through their own deadline
//! 4. Close the bus

use crate::container::{open_store, NodeConfig};
use anyhow::{anyhow, Context, Result};
use hl_01_api_gateway::{ApiGatewayService, GatewayResult};
use hl_02_patient_ingestion::{FlushReport, IngestionError, IngestionWorker, PatientStore};
use shared_bus::{InMemoryMessageBus, MessagePublisher};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info};

/// The main node runtime.
pub struct NodeRuntime {
    config: NodeConfig,
    bus: Arc<InMemoryMessageBus>,
    store: Arc<dyn PatientStore>,
}

enum Exit {
    Signal,
    Worker(Result<Result<FlushReport, IngestionError>, JoinError>),
    Gateway(Result<GatewayResult<()>, JoinError>),
}

impl NodeRuntime {
    /// Validate the configuration and open the store.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let store = open_store(&config.storage)?;
        Ok(Self::with_store(config, store))
    }

    /// Runtime over an already opened store.
    pub fn with_store(config: NodeConfig, store: Arc<dyn PatientStore>) -> Self {
        Self {
            config,
            bus: Arc::new(InMemoryMessageBus::new()),
            store,
        }
    }

    /// The bus both halves communicate over.
    pub fn bus(&self) -> Arc<InMemoryMessageBus> {
        Arc::clone(&self.bus)
    }

    /// Run until `signal` resolves or either half stops on its own.
    ///
    /// # Returns
    /// The worker's flush totals.
    ///
    /// # Errors
    /// Startup failures, a fatal worker error (bus unavailable), or a gateway
    /// error such as a failed bind.
    pub async fn run(self, signal: impl Future<Output = ()>) -> Result<FlushReport> {
        let Self { config, bus, store } = self;
        let publisher = Arc::clone(&bus) as Arc<dyn MessagePublisher>;

        let worker = IngestionWorker::start(
            store,
            &config.ingestion,
            Arc::clone(&publisher),
            bus.as_ref(),
        )
        .await
        .context("failed to start ingestion worker")?;
        let gateway = ApiGatewayService::new(config.gateway.clone(), publisher, bus.as_ref())
            .context("failed to start API gateway")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));
        let mut gateway_handle = tokio::spawn(gateway.start(shutdown_rx));
        info!(addr = %config.gateway.http_addr(), "Node running");

        let exit = tokio::select! {
            _ = signal => Exit::Signal,
            result = &mut worker_handle => Exit::Worker(result),
            result = &mut gateway_handle => Exit::Gateway(result),
        };
        let (worker_done, gateway_done) = match exit {
            Exit::Signal => {
                info!("Shutdown signal received");
                (None, None)
            }
            Exit::Worker(result) => (Some(result), None),
            Exit::Gateway(result) => (None, Some(result)),
        };

        info!("Initiating graceful shutdown...");
        let _ = shutdown_tx.send(true);

        let worker_result = match worker_done {
            Some(result) => result,
            None => worker_handle.await,
        };
        let gateway_result = match gateway_done {
            Some(result) => result,
            None => gateway_handle.await,
        };
        bus.close();

        if let Err(e) = &gateway_result {
            error!(error = %e, "Gateway task failed");
        }
        let report = worker_result
            .map_err(|e| anyhow!("ingestion worker task failed: {e}"))?
            .context("ingestion worker failed")?;
        gateway_result
            .map_err(|e| anyhow!("gateway task failed: {e}"))?
            .context("API gateway failed")?;

        info!(
            committed_batches = report.committed_batches,
            committed_records = report.committed_records,
            "Shutdown complete"
        );
        Ok(report)
    }
}
