//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod container;
pub mod logging;
pub mod runtime;

pub use container::{ConfigError, NodeConfig};
pub use runtime::NodeRuntime;
