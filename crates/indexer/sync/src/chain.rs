use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::types::{BlockRange, LogRecord};

/// Read access to the chain being indexed.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> eyre::Result<u64>;

    /// Current head block number, independent of any subscription.
    async fn latest_block_number(&self) -> eyre::Result<u64>;

    /// All logs in `range`, ordered by block number and log index.
    async fn get_logs(&self, range: BlockRange) -> eyre::Result<Vec<LogRecord>>;

    /// Stream of new head block numbers, when the transport can push them.
    ///
    /// `Ok(None)` means the client only supports polling.
    async fn subscribe_heads(&self) -> eyre::Result<Option<BoxStream<'static, u64>>> {
        Ok(None)
    }
}
