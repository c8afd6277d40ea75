use async_trait::async_trait;
use store_sync::{ChainCheckpoint, CheckpointError, LogBatch, StorageAdapter};

use crate::client::{DbClient, classify_read_error};

#[async_trait]
impl StorageAdapter for DbClient {
    fn schema_version(&self) -> &str {
        self.current_schema_version()
    }

    async fn read_checkpoint(
        &self,
        chain_id: u64,
    ) -> Result<Option<ChainCheckpoint>, CheckpointError> {
        let Some(row) = self
            .get_checkpoint(chain_id)
            .await
            .map_err(classify_read_error)?
        else {
            return Ok(None);
        };

        let last_updated_block = row
            .last_updated_block_number
            .map(u64::try_from)
            .transpose()
            .map_err(CheckpointError::unavailable)?;

        Ok(Some(ChainCheckpoint {
            chain_id,
            schema_version: row.schema_version,
            last_updated_block,
        }))
    }

    async fn apply_batch(&self, batch: &LogBatch) -> eyre::Result<()> {
        self.apply_log_batch(batch).await
    }

    async fn wipe(&self) -> eyre::Result<()> {
        self.reset_schema().await
    }
}
