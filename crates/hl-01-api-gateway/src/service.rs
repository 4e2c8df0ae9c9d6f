//! API Gateway service - main entry point.
//!
//! Wires the registry, correlator, dispatcher and HTTP router together and
//! runs them until shutdown.

use crate::domain::config::GatewayConfig;
use crate::domain::error::{GatewayError, GatewayResult};
use crate::domain::pending::{cleanup_task, PendingRequestStore};
use crate::http::build_router;
use crate::ipc::correlator::Correlator;
use crate::ipc::dispatcher::ResponseDispatcher;
use axum::Router;
use shared_bus::{MessagePublisher, MessageSubscriber};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// API Gateway service state
pub struct ApiGatewayService {
    config: GatewayConfig,
    pending: Arc<PendingRequestStore>,
    correlator: Arc<Correlator>,
    dispatcher: Option<ResponseDispatcher>,
}

impl ApiGatewayService {
    /// Create a new API Gateway service.
    ///
    /// Subscribes to the response topic immediately, so responses to calls
    /// made through `correlator()` are never missed even before `start`.
    pub fn new(
        config: GatewayConfig,
        publisher: Arc<dyn MessagePublisher>,
        subscriber: &dyn MessageSubscriber,
    ) -> GatewayResult<Self> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let pending = Arc::new(PendingRequestStore::new());
        let correlator = Arc::new(Correlator::new(
            Arc::clone(&pending),
            publisher,
            config.topics.clone(),
            config.timeouts.request,
        ));
        let dispatcher = correlator.start_dispatcher(subscriber)?;

        Ok(Self {
            config,
            pending,
            correlator,
            dispatcher: Some(dispatcher),
        })
    }

    /// The correlator, for in-process callers
    pub fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    /// Get the correlation registry
    pub fn pending_store(&self) -> Arc<PendingRequestStore> {
        Arc::clone(&self.pending)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.correlator), &self.config.cors)
    }

    /// Run the gateway until `shutdown` flips to true.
    ///
    /// HTTP stops accepting on shutdown and in-flight requests finish (each
    /// bounded by its own deadline). The dispatcher keeps routing responses
    /// until the server has drained, then stops.
    ///
    /// # Errors
    /// - `Bind` if the listener cannot be opened
    /// - `BusUnavailable` if the response subscription ends while serving;
    ///   HTTP is stopped since every call would time out
    pub async fn start(mut self, shutdown: watch::Receiver<bool>) -> GatewayResult<()> {
        info!("Starting API Gateway...");

        let dispatcher = self
            .dispatcher
            .take()
            .ok_or(GatewayError::DispatcherAlreadyRunning)?;

        // Background tasks stop after the HTTP server, not with it.
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut dispatcher_handle = tokio::spawn(dispatcher.run(stop_rx.clone()));
        let cleanup_handle = tokio::spawn(cleanup_task(
            Arc::clone(&self.pending),
            self.config.timeouts.cleanup_interval,
            stop_rx,
        ));

        let serve = async {
            if self.config.http.enabled {
                self.serve_http(shutdown).await
            } else {
                info!("HTTP server disabled");
                wait_for_shutdown(shutdown).await;
                Ok(())
            }
        };
        let first = tokio::select! {
            served = serve => First::Served(served),
            dispatched = &mut dispatcher_handle => First::Dispatcher(dispatched),
        };

        let _ = stop_tx.send(true);
        let (served, dispatched) = match first {
            First::Served(served) => (served, dispatcher_handle.await),
            First::Dispatcher(dispatched) => {
                warn!("Response dispatch stopped, shutting down HTTP");
                (Ok(()), dispatched)
            }
        };
        if let Err(e) = cleanup_handle.await {
            error!(error = %e, "Cleanup task failed");
        }

        info!(
            pending = self.pending.pending_count(),
            "API Gateway stopped"
        );
        served?;
        dispatched.map_err(|e| {
            error!(error = %e, "Response dispatcher task failed");
            GatewayError::Internal(format!("response dispatcher task failed: {e}"))
        })?
    }

    async fn serve_http(&self, shutdown: watch::Receiver<bool>) -> GatewayResult<()> {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;

        info!(addr = %addr, "Starting HTTP server");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// Whichever of serving and dispatching ended first.
enum First {
    Served(GatewayResult<()>),
    Dispatcher(Result<GatewayResult<()>, JoinError>),
}

/// Resolve once the watch value is true or its sender is gone.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
