use serde::{Deserialize, Serialize};

/// Durable sync position of one chain, as written alongside every applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCheckpoint {
    pub chain_id: u64,
    pub schema_version: String,
    /// Last block whose logs were durably applied. `None` when the row exists
    /// but nothing has been applied yet.
    pub last_updated_block: Option<u64>,
}

/// Starting point of streaming ingestion, fixed once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    start_block: u64,
}

impl SyncCursor {
    pub fn new(start_block: u64) -> Self {
        Self { start_block }
    }

    pub fn start_block(&self) -> u64 {
        self.start_block
    }
}

/// Inclusive range of block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Largest range starting at `from` that holds at most `max_len` blocks and
    /// does not pass `head`.
    pub fn bounded(from: u64, head: u64, max_len: u64) -> Option<Self> {
        let max_len = max_len.max(1);
        let to = from.saturating_add(max_len - 1).min(head);
        Self::new(from, to)
    }

    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// A raw EVM log. Hex fields keep their `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

impl LogRecord {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// Position of the log within the chain, used for ordering.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Logs of a contiguous block range, applied to storage as one unit.
#[derive(Debug, Clone)]
pub struct LogBatch {
    pub chain_id: u64,
    pub range: BlockRange,
    pub logs: Vec<LogRecord>,
}

impl LogBatch {
    /// Block number the checkpoint moves to once this batch is committed.
    pub fn checkpoint_block(&self) -> u64 {
        self.range.to
    }
}

/// Published after each committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedBatch {
    pub range: BlockRange,
    pub log_count: usize,
}
