//! # Patient Relay Node
//!
//! Binary entry point: the HTTP gateway and the ingestion worker in one
//! process, joined by the in-memory bus.
//!
//! ```text
//!   HTTP ──► hl-01 gateway ──createPatient/getPatientId──► hl-02 ingestion ──► store
//!                 ▲                                               │
//!                 └─────────────────patientInfo───────────────────┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`HL_CONFIG` file, then `HL_*` overrides)
//! 2. Initialise logging
//! 3. Open the store, start ingestion, start the gateway
//! 4. Run until Ctrl-C or SIGTERM

use anyhow::{Context, Result};
use node_runtime::container::NodeConfig;
use node_runtime::logging::init_tracing;
use node_runtime::NodeRuntime;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!("===========================================");
    info!("  Patient Relay Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        http = %config.gateway.http_addr(),
        staging_dir = %config.ingestion.staging_dir.display(),
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let runtime = NodeRuntime::new(config)?;
    match runtime.run(shutdown_signal()).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = ?e, "Node stopped with error");
            Err(e)
        }
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
