use thiserror::Error;

/// Why a checkpoint lookup did not return a row.
///
/// A missing backend is the expected state on first run. Anything else means
/// the backend exists but could not be read.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("storage backend does not exist yet: {0}")]
    BackendMissing(String),

    #[error("checkpoint lookup failed: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CheckpointError {
    pub fn unavailable<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable(Box::new(err))
    }

    pub fn is_backend_missing(&self) -> bool {
        matches!(self, Self::BackendMissing(_))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("batch {from}..={to} would re-apply blocks up to the committed block {committed}")]
    Overlap { from: u64, to: u64, committed: u64 },

    #[error("log at block {block} is outside the requested range {from}..={to}")]
    LogOutOfRange { block: u64, from: u64, to: u64 },

    #[error("chain request timed out after {0:?}")]
    Timeout(std::time::Duration),
}
