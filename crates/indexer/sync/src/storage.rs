use async_trait::async_trait;

use crate::{
    error::CheckpointError,
    types::{ChainCheckpoint, LogBatch},
};

/// Durable home of indexed logs and the chain checkpoint.
///
/// The sync engine is the only writer. Implementations must commit the logs of
/// a batch and the checkpoint moving to `batch.checkpoint_block()` together or
/// not at all.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Version of the stored data shape. A checkpoint written under a different
    /// version invalidates everything stored.
    fn schema_version(&self) -> &str;

    async fn read_checkpoint(
        &self,
        chain_id: u64,
    ) -> Result<Option<ChainCheckpoint>, CheckpointError>;

    async fn apply_batch(&self, batch: &LogBatch) -> eyre::Result<()>;

    /// Drops all indexed state, leaving an empty but usable backend.
    async fn wipe(&self) -> eyre::Result<()>;
}
