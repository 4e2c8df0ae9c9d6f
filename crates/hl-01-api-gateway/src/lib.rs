//! HL-01 API Gateway - synchronous patient API over an asynchronous bus.
//!
//! Every HTTP request becomes a bus command keyed by a fresh correlation id;
//! the caller is unblocked when the correlated response arrives or its
//! deadline passes.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (POST /patients, GET /patients/:id)
//!                  │
//!                  ▼
//!   ┌──────────────────────────────┐   publish    createPatient
//!   │          Correlator          │ ───────────► getPatientId
//!   │ register → publish → await   │
//!   └──────────────┬───────────────┘
//!                  │
//!   ┌──────────────┴───────────────┐
//!   │     Correlation Registry     │
//!   │ CorrelationId → oneshot slot │
//!   └──────────────▲───────────────┘
//!                  │ complete()
//!   ┌──────────────┴───────────────┐   subscribe
//!   │ Response Dispatcher (1 loop) │ ◄─────────── patientInfo
//!   └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hl_01_api_gateway::{ApiGatewayService, GatewayConfig};
//!
//! let service = ApiGatewayService::new(GatewayConfig::default(), bus.clone(), bus.as_ref())?;
//! service.start(shutdown_rx).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod http;
pub mod ipc;
pub mod service;

pub use domain::{
    CorrelationId, GatewayConfig, GatewayError, GatewayResult, PendingRequestStore,
    PendingSnapshot,
};
pub use ipc::{Correlator, ResponseDispatcher};
pub use service::ApiGatewayService;
