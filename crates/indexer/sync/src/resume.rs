//! Decides where ingestion starts and whether stored data is still valid.

use tracing::{info, warn};

use crate::{
    error::CheckpointError,
    storage::StorageAdapter,
    types::{ChainCheckpoint, SyncCursor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    pub start_block: u64,
    pub must_wipe_storage: bool,
}

pub fn plan(
    chain_id: u64,
    current_schema_version: &str,
    checkpoint: Option<&ChainCheckpoint>,
    configured_start_block: u64,
) -> ResumePlan {
    let fresh = ResumePlan {
        start_block: configured_start_block,
        must_wipe_storage: false,
    };

    let Some(checkpoint) = checkpoint else {
        return fresh;
    };

    if checkpoint.chain_id != chain_id {
        warn!(
            chain_id,
            checkpoint_chain_id = checkpoint.chain_id,
            "Ignoring checkpoint recorded for another chain"
        );
        return fresh;
    }

    if checkpoint.schema_version != current_schema_version {
        return ResumePlan {
            start_block: configured_start_block,
            must_wipe_storage: true,
        };
    }

    match checkpoint.last_updated_block {
        Some(block) => ResumePlan {
            start_block: block.saturating_add(1),
            must_wipe_storage: false,
        },
        None => fresh,
    }
}

/// Reads the checkpoint, treating a missing backend as a first run.
///
/// Other lookup failures also fall back to a first run, but are logged as
/// such so they can be told apart from a genuinely empty backend.
pub async fn load_checkpoint<S>(storage: &S, chain_id: u64) -> Option<ChainCheckpoint>
where
    S: StorageAdapter + ?Sized,
{
    match storage.read_checkpoint(chain_id).await {
        Ok(Some(checkpoint)) => Some(checkpoint),
        Ok(None) => {
            info!(chain_id, "No checkpoint stored for chain, starting fresh");
            None
        }
        Err(CheckpointError::BackendMissing(detail)) => {
            info!(chain_id, %detail, "Storage backend not initialized yet, starting fresh");
            None
        }
        Err(err @ CheckpointError::Unavailable(_)) => {
            warn!(
                chain_id,
                reason = "unavailable",
                error = %err,
                "Checkpoint lookup failed, falling back to the configured start block"
            );
            None
        }
    }
}

/// Computes the sync cursor, wiping storage first when the stored schema is
/// stale. The wipe has completed when this returns.
pub async fn prepare<S>(
    storage: &S,
    chain_id: u64,
    configured_start_block: u64,
) -> eyre::Result<SyncCursor>
where
    S: StorageAdapter + ?Sized,
{
    let checkpoint = load_checkpoint(storage, chain_id).await;
    let current = storage.schema_version();
    let plan = plan(chain_id, current, checkpoint.as_ref(), configured_start_block);

    if plan.must_wipe_storage {
        let previous = checkpoint
            .as_ref()
            .map(|c| c.schema_version.as_str())
            .unwrap_or_default();
        info!(
            chain_id,
            from = previous,
            to = current,
            "Schema version changed, cleaning storage"
        );
        storage.wipe().await?;
    } else if plan.start_block != configured_start_block {
        info!(chain_id, start_block = plan.start_block, "Resuming from block number");
    }

    Ok(SyncCursor::new(plan.start_block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::types::{BlockRange, LogBatch};

    fn checkpoint(schema: &str, block: Option<u64>) -> ChainCheckpoint {
        ChainCheckpoint {
            chain_id: 1,
            schema_version: schema.to_string(),
            last_updated_block: block,
        }
    }

    #[test]
    fn resumes_after_last_applied_block() {
        for n in [0u64, 1, 100, 1_000_000, u64::MAX - 1] {
            let plan = plan(1, "v1", Some(&checkpoint("v1", Some(n))), 7);
            assert_eq!(plan.start_block, n + 1);
            assert!(!plan.must_wipe_storage);
        }
    }

    #[test]
    fn schema_change_requires_wipe() {
        for block in [None, Some(0), Some(100)] {
            let plan = plan(1, "v2", Some(&checkpoint("v1", block)), 7);
            assert!(plan.must_wipe_storage);
            assert_eq!(plan.start_block, 7);
        }
    }

    #[test]
    fn no_checkpoint_uses_configured_start() {
        let plan = plan(1, "v1", None, 42);
        assert_eq!(
            plan,
            ResumePlan {
                start_block: 42,
                must_wipe_storage: false
            }
        );
    }

    #[test]
    fn checkpoint_without_block_uses_configured_start() {
        let plan = plan(1, "v1", Some(&checkpoint("v1", None)), 42);
        assert_eq!(plan.start_block, 42);
        assert!(!plan.must_wipe_storage);
    }

    #[test]
    fn foreign_chain_checkpoint_is_ignored() {
        let mut other = checkpoint("v0", Some(500));
        other.chain_id = 5;
        let plan = plan(1, "v1", Some(&other), 42);
        assert_eq!(plan.start_block, 42);
        assert!(!plan.must_wipe_storage);
    }

    #[tokio::test]
    async fn missing_backend_starts_fresh() {
        let storage = MemoryStorage::uninitialized("v1");
        assert!(storage.read_checkpoint(1).await.unwrap_err().is_backend_missing());

        let cursor = prepare(&storage, 1, 9).await.unwrap();
        assert_eq!(cursor.start_block(), 9);
        assert_eq!(storage.wipe_count().await, 0);
    }

    #[tokio::test]
    async fn unavailable_backend_starts_fresh() {
        let storage = MemoryStorage::new("v1");
        storage.set_read_failure(true).await;

        let cursor = prepare(&storage, 1, 9).await.unwrap();
        assert_eq!(cursor.start_block(), 9);
        assert_eq!(storage.wipe_count().await, 0);
    }

    #[tokio::test]
    async fn prepare_wipes_before_returning() {
        let old = MemoryStorage::new("v1");
        old.apply_batch(&LogBatch {
            chain_id: 1,
            range: BlockRange::new(0, 100).unwrap(),
            logs: vec![],
        })
        .await
        .unwrap();
        let storage = old.with_schema_version("v2");

        let cursor = prepare(&storage, 1, 3).await.unwrap();
        assert_eq!(cursor.start_block(), 3);
        assert_eq!(storage.wipe_count().await, 1);
        assert!(storage.read_checkpoint(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prepare_resumes_from_checkpoint() {
        let storage = MemoryStorage::new("v1");
        storage
            .apply_batch(&LogBatch {
                chain_id: 1,
                range: BlockRange::new(0, 100).unwrap(),
                logs: vec![],
            })
            .await
            .unwrap();

        let cursor = prepare(&storage, 1, 0).await.unwrap();
        assert_eq!(cursor.start_block(), 101);
        assert_eq!(storage.wipe_count().await, 0);
    }
}
