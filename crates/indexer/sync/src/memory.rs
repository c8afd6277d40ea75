//! In-memory storage adapter.
//!
//! Keeps logs and checkpoints in RAM; everything is lost when the process
//! exits. Used by tests and by embedders that only need the live signals.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::CheckpointError,
    storage::StorageAdapter,
    types::{BlockRange, ChainCheckpoint, LogBatch, LogRecord},
};

/// A write-side operation, in the order it reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Wipe,
    Apply(BlockRange),
}

#[derive(Debug, Default)]
struct Inner {
    initialized: bool,
    checkpoints: HashMap<u64, ChainCheckpoint>,
    logs: BTreeMap<(u64, u64, u64), LogRecord>,
    operations: Vec<StorageOp>,
    apply_attempts: usize,
    failing_applies: usize,
    failing_reads: bool,
}

#[derive(Debug)]
pub struct MemoryStorage {
    schema_version: String,
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            inner: Mutex::new(Inner {
                initialized: true,
                ..Default::default()
            }),
        }
    }

    /// A store whose backend has not been created yet. Checkpoint reads fail
    /// with [`CheckpointError::BackendMissing`] until the first write or wipe.
    pub fn uninitialized(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Reopens the same data under another schema version, as a newer build
    /// would after a restart.
    pub fn with_schema_version(self, schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            inner: self.inner,
        }
    }

    pub async fn set_read_failure(&self, failing: bool) {
        self.inner.lock().await.failing_reads = failing;
    }

    /// Makes the next `count` calls to `apply_batch` fail without writing.
    pub async fn fail_next_applies(&self, count: usize) {
        self.inner.lock().await.failing_applies = count;
    }

    pub async fn logs(&self, chain_id: u64) -> Vec<LogRecord> {
        self.inner
            .lock()
            .await
            .logs
            .iter()
            .filter(|((chain, _, _), _)| *chain == chain_id)
            .map(|(_, log)| log.clone())
            .collect()
    }

    pub async fn operations(&self) -> Vec<StorageOp> {
        self.inner.lock().await.operations.clone()
    }

    pub async fn applied_ranges(&self) -> Vec<BlockRange> {
        self.inner
            .lock()
            .await
            .operations
            .iter()
            .filter_map(|op| match op {
                StorageOp::Apply(range) => Some(*range),
                StorageOp::Wipe => None,
            })
            .collect()
    }

    pub async fn wipe_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .operations
            .iter()
            .filter(|op| matches!(op, StorageOp::Wipe))
            .count()
    }

    pub async fn apply_attempts(&self) -> usize {
        self.inner.lock().await.apply_attempts
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    async fn read_checkpoint(
        &self,
        chain_id: u64,
    ) -> Result<Option<ChainCheckpoint>, CheckpointError> {
        let inner = self.inner.lock().await;
        if inner.failing_reads {
            return Err(CheckpointError::unavailable(std::io::Error::other(
                "memory storage read failure",
            )));
        }
        if !inner.initialized {
            return Err(CheckpointError::BackendMissing(
                "memory storage not initialized".to_string(),
            ));
        }
        Ok(inner.checkpoints.get(&chain_id).cloned())
    }

    async fn apply_batch(&self, batch: &LogBatch) -> eyre::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.apply_attempts += 1;
        if inner.failing_applies > 0 {
            inner.failing_applies -= 1;
            return Err(eyre::eyre!(
                "memory storage rejected batch {}",
                batch.range
            ));
        }

        inner.initialized = true;
        for log in &batch.logs {
            inner
                .logs
                .entry((batch.chain_id, log.block_number, log.log_index))
                .or_insert_with(|| log.clone());
        }
        inner.checkpoints.insert(
            batch.chain_id,
            ChainCheckpoint {
                chain_id: batch.chain_id,
                schema_version: self.schema_version.clone(),
                last_updated_block: Some(batch.checkpoint_block()),
            },
        );
        inner.operations.push(StorageOp::Apply(batch.range));
        Ok(())
    }

    async fn wipe(&self) -> eyre::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.initialized = true;
        inner.checkpoints.clear();
        inner.logs.clear();
        inner.operations.push(StorageOp::Wipe);
        Ok(())
    }
}
