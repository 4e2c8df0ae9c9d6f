//! Domain types for the API Gateway.
//!
//! Correlation ids, the correlation registry, configuration and errors.

pub mod config;
pub mod correlation;
pub mod error;
pub mod pending;

// Re-exports for convenience
pub use config::{ConfigError, CorsConfig, GatewayConfig, HttpConfig, TimeoutConfig};
pub use correlation::CorrelationId;
pub use error::{GatewayError, GatewayResult, RegistryError};
pub use pending::{PendingRequestStore, PendingSnapshot};
