//! Adapters layer.
//!
//! - `bus`: consumes commands and publishes responses
//! - `rocksdb`: persistent Store Adapter (feature `rocksdb`)

pub mod bus;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use bus::CommandConsumer;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbPatientStore};
