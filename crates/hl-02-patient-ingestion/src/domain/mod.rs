//! Domain layer: staging artifacts, the batch buffer and error types.

pub mod buffer;
pub mod errors;
pub mod staging;

pub use buffer::{append_blocking, drain_blocking, BatchBuffer, BufferSize};
pub use errors::{IngestionError, StagingError, StoreError};
pub use staging::{SealedBatch, StagingBatch};
