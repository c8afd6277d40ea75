//! Block progress signals published by the sync engine.
//!
//! `latest_chain_block` and `last_applied_block` are latest-value channels:
//! a slow reader sees fewer intermediate values but never blocks the engine.
//! Both only move forward. Readers that need every committed batch subscribe
//! to the applied-batch broadcast instead.

use tokio::sync::{broadcast, watch};

use crate::types::AppliedBatch;

pub const DEFAULT_BATCH_BUFFER: usize = 256;

/// Write side, owned by the sync engine.
#[derive(Debug)]
pub struct ProgressPublisher {
    latest_chain_block: watch::Sender<Option<u64>>,
    last_applied_block: watch::Sender<Option<u64>>,
    batches: broadcast::Sender<AppliedBatch>,
}

/// Read side. Cheap to clone; every clone observes the same signals.
#[derive(Debug, Clone)]
pub struct BlockProgress {
    latest_chain_block: watch::Receiver<Option<u64>>,
    last_applied_block: watch::Receiver<Option<u64>>,
    batches: broadcast::Sender<AppliedBatch>,
}

impl ProgressPublisher {
    pub fn new(batch_buffer: usize) -> (Self, BlockProgress) {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (applied_tx, applied_rx) = watch::channel(None);
        let (batches, _) = broadcast::channel(batch_buffer.max(1));

        let progress = BlockProgress {
            latest_chain_block: latest_rx,
            last_applied_block: applied_rx,
            batches: batches.clone(),
        };

        (
            Self {
                latest_chain_block: latest_tx,
                last_applied_block: applied_tx,
                batches,
            },
            progress,
        )
    }

    /// Records a chain head. Returns `true` when the published head moved.
    pub fn observe_head(&self, block: u64) -> bool {
        advance(&self.latest_chain_block, block)
    }

    /// Marks `block` as durably applied without a batch, e.g. the block
    /// preceding the resume point.
    pub fn seed_applied(&self, block: u64) {
        advance(&self.last_applied_block, block);
    }

    pub fn record_applied(&self, batch: AppliedBatch) {
        advance(&self.last_applied_block, batch.range.to);
        // No receivers is fine; the broadcast is best-effort fan-out.
        let _ = self.batches.send(batch);
    }

    pub fn latest_chain_block(&self) -> Option<u64> {
        *self.latest_chain_block.borrow()
    }

    pub fn last_applied_block(&self) -> Option<u64> {
        *self.last_applied_block.borrow()
    }

    /// Fresh receiver for head updates, used by the engine to wake up early.
    pub fn subscribe_heads(&self) -> watch::Receiver<Option<u64>> {
        self.latest_chain_block.subscribe()
    }
}

impl BlockProgress {
    pub fn latest_chain_block(&self) -> Option<u64> {
        *self.latest_chain_block.borrow()
    }

    pub fn last_applied_block(&self) -> Option<u64> {
        *self.last_applied_block.borrow()
    }

    pub fn watch_latest_chain_block(&self) -> watch::Receiver<Option<u64>> {
        self.latest_chain_block.clone()
    }

    pub fn watch_last_applied_block(&self) -> watch::Receiver<Option<u64>> {
        self.last_applied_block.clone()
    }

    /// Every batch committed after this call. A receiver that falls behind by
    /// more than the buffer gets `RecvError::Lagged` with the number skipped.
    pub fn subscribe_batches(&self) -> broadcast::Receiver<AppliedBatch> {
        self.batches.subscribe()
    }
}

fn advance(signal: &watch::Sender<Option<u64>>, block: u64) -> bool {
    signal.send_if_modified(|current| match current {
        Some(value) if *value >= block => false,
        _ => {
            *current = Some(block);
            true
        }
    })
}
