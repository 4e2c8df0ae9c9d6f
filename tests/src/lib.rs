//! # Patient Relay Test Suite
//!
//! Cross-crate flows over the in-memory bus: the gateway's correlator and
//! router in front, the ingestion worker and an in-memory store behind.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # Full stack wiring shared by the flows
//!     ├── flows.rs       # End-to-end request scenarios
//!     ├── properties.rs  # Uniqueness, correlation, durability properties
//!     └── http.rs        # The same flows through the HTTP router
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hl-tests
//! cargo test -p hl-tests integration::properties::
//! ```

pub mod integration;
