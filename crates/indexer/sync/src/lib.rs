//! Resumable log synchronization: checkpoint-driven resume, batched ingestion
//! into a pluggable store, and progress signals for readiness.

pub mod catch_up;
pub mod chain;
pub mod error;
pub mod memory;
pub mod progress;
pub mod resume;
pub mod retry;
pub mod storage;
pub mod sync;
pub mod types;

pub use catch_up::{is_caught_up, observe_caught_up, CaughtUp};
pub use chain::ChainClient;
pub use error::{CheckpointError, SyncError};
pub use progress::BlockProgress;
pub use storage::StorageAdapter;
pub use sync::{SyncEngine, SyncHandle, SyncOptions};
pub use types::{AppliedBatch, BlockRange, ChainCheckpoint, LogBatch, LogRecord, SyncCursor};
