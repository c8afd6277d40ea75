use std::{future::Future, sync::Arc, time::Duration};

use futures_util::StreamExt;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    chain::ChainClient,
    error::SyncError,
    progress::{BlockProgress, ProgressPublisher, DEFAULT_BATCH_BUFFER},
    retry::Backoff,
    storage::StorageAdapter,
    types::{AppliedBatch, BlockRange, LogBatch, LogRecord, SyncCursor},
};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub start_block: u64,
    pub max_block_range: u64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    /// Applied batches kept for slow subscribers before they start lagging.
    pub batch_buffer: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            start_block: 0,
            max_block_range: 1000,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            retry_min_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            batch_buffer: DEFAULT_BATCH_BUFFER,
        }
    }
}

impl SyncOptions {
    pub fn starting_at(mut self, cursor: SyncCursor) -> Self {
        self.start_block = cursor.start_block();
        self
    }
}

pub struct SyncHandle {
    pub progress: BlockProgress,
    pub task: JoinHandle<eyre::Result<()>>,
}

/// Streams logs from the chain into storage, one contiguous batch at a time.
pub struct SyncEngine<C: ?Sized, S: ?Sized> {
    chain_id: u64,
    chain: Arc<C>,
    storage: Arc<S>,
    options: SyncOptions,
    publisher: Arc<ProgressPublisher>,
    shutdown: watch::Receiver<bool>,
    backoff: Backoff,
    next_block: u64,
    /// Range chosen but not yet committed. Kept across retries.
    pending: Option<BlockRange>,
    committed: Option<u64>,
    head_polled_at: Option<Instant>,
}

impl<C, S> SyncEngine<C, S>
where
    C: ChainClient + ?Sized + 'static,
    S: StorageAdapter + ?Sized + 'static,
{
    /// Spawns the engine. The returned progress handle is live immediately;
    /// the task ends with `Ok(())` once `shutdown` flips to `true`.
    pub fn start(
        chain_id: u64,
        chain: Arc<C>,
        storage: Arc<S>,
        options: SyncOptions,
        shutdown: watch::Receiver<bool>,
    ) -> SyncHandle {
        let (publisher, progress) = ProgressPublisher::new(options.batch_buffer);
        if let Some(previous) = options.start_block.checked_sub(1) {
            publisher.seed_applied(previous);
        }

        let engine = Self {
            chain_id,
            chain,
            storage,
            backoff: Backoff::new(options.retry_min_delay, options.retry_max_delay),
            next_block: options.start_block,
            options,
            publisher: Arc::new(publisher),
            shutdown,
            pending: None,
            committed: None,
            head_polled_at: None,
        };

        SyncHandle {
            progress,
            task: tokio::spawn(engine.run()),
        }
    }

    #[instrument(skip_all, fields(chain_id = self.chain_id))]
    async fn run(mut self) -> eyre::Result<()> {
        info!(
            start_block = self.next_block,
            max_block_range = self.options.max_block_range,
            "Starting sync"
        );

        let heads = self.spawn_head_listener();
        let result = self.pump().await;
        heads.abort();

        match &result {
            Ok(()) => info!(next_block = self.next_block, "Sync stopped"),
            Err(err) => warn!(error = %err, "Sync aborted"),
        }
        result
    }

    async fn pump(&mut self) -> eyre::Result<()> {
        while !self.is_stopped() {
            let range = match self.next_range().await {
                Ok(Some(range)) => range,
                Ok(None) => {
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    if self.back_off("head query", None, &err).await {
                        break;
                    }
                    continue;
                }
            };

            let logs = match self.fetch_logs(range).await {
                Ok(logs) => logs,
                Err(err) => {
                    if self.back_off("log fetch", Some(range), &err).await {
                        break;
                    }
                    continue;
                }
            };

            let batch = LogBatch {
                chain_id: self.chain_id,
                range,
                logs,
            };
            if !self.commit(batch).await? {
                break;
            }
        }
        Ok(())
    }

    /// Range to process next, or `None` when there is nothing past the head.
    async fn next_range(&mut self) -> eyre::Result<Option<BlockRange>> {
        if let Some(range) = self.pending {
            return Ok(Some(range));
        }

        // A known head ahead of us is reused until the poll interval lapses,
        // so the published head keeps moving during a long backfill.
        let poll_due = self
            .head_polled_at
            .is_none_or(|at| at.elapsed() >= self.options.poll_interval);
        let known_head = self
            .publisher
            .latest_chain_block()
            .filter(|head| !poll_due && *head >= self.next_block);
        let head = match known_head {
            Some(head) => head,
            None => {
                let polled = self.call(self.chain.latest_block_number()).await?;
                self.head_polled_at = Some(Instant::now());
                self.publisher.observe_head(polled);
                // A pushed head may be ahead of the polled one.
                self.publisher.latest_chain_block().unwrap_or(polled)
            }
        };

        self.pending = BlockRange::bounded(self.next_block, head, self.options.max_block_range);
        Ok(self.pending)
    }

    async fn fetch_logs(&self, range: BlockRange) -> eyre::Result<Vec<LogRecord>> {
        let mut logs = self.call(self.chain.get_logs(range)).await?;

        if let Some(stray) = logs.iter().find(|log| !range.contains(log.block_number)) {
            return Err(SyncError::LogOutOfRange {
                block: stray.block_number,
                from: range.from,
                to: range.to,
            }
            .into());
        }

        logs.sort_by_key(LogRecord::position);
        Ok(logs)
    }

    /// Applies `batch` until it sticks. Returns `Ok(false)` when shutdown was
    /// requested while backing off.
    async fn commit(&mut self, batch: LogBatch) -> eyre::Result<bool> {
        let range = batch.range;
        if let Some(committed) = self.committed {
            if range.from <= committed {
                return Err(SyncError::Overlap {
                    from: range.from,
                    to: range.to,
                    committed,
                }
                .into());
            }
        }

        loop {
            match self.storage.apply_batch(&batch).await {
                Ok(()) => break,
                Err(err) => {
                    if self.back_off("batch apply", Some(range), &err).await {
                        return Ok(false);
                    }
                }
            }
        }

        self.committed = Some(range.to);
        self.next_block = range.to.saturating_add(1);
        self.pending = None;
        self.backoff.reset();

        let lag = self
            .publisher
            .latest_chain_block()
            .map_or(0, |head| head.saturating_sub(range.to));
        info!(
            from = range.from,
            to = range.to,
            logs = batch.logs.len(),
            lag,
            "Applied batch"
        );

        self.publisher.record_applied(AppliedBatch {
            range,
            log_count: batch.logs.len(),
        });
        Ok(true)
    }

    async fn call<T>(&self, fut: impl Future<Output = eyre::Result<T>>) -> eyre::Result<T> {
        let limit = self.options.request_timeout;
        timeout(limit, fut)
            .await
            .map_err(|_| SyncError::Timeout(limit))?
    }

    /// Waits for the next poll tick or a pushed head. Returns `true` on shutdown.
    async fn idle(&mut self) -> bool {
        let mut heads = self.publisher.subscribe_heads();
        heads.borrow_and_update();

        tokio::select! {
            _ = sleep(self.options.poll_interval) => false,
            _ = heads.changed() => false,
            _ = stopped(&mut self.shutdown) => true,
        }
    }

    /// Sleeps for the next backoff delay. Returns `true` on shutdown.
    async fn back_off(
        &mut self,
        what: &'static str,
        range: Option<BlockRange>,
        err: &eyre::Report,
    ) -> bool {
        let delay = self.backoff.next_delay();
        warn!(
            attempt = self.backoff.attempt(),
            range = ?range,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "{what} failed, retrying"
        );

        tokio::select! {
            _ = sleep(delay) => false,
            _ = stopped(&mut self.shutdown) => true,
        }
    }

    fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn spawn_head_listener(&self) -> JoinHandle<()> {
        let chain = self.chain.clone();
        let publisher = self.publisher.clone();
        let chain_id = self.chain_id;

        tokio::spawn(async move {
            match chain.subscribe_heads().await {
                Ok(Some(mut heads)) => {
                    info!(chain_id, "Subscribed to new heads");
                    while let Some(head) = heads.next().await {
                        if publisher.observe_head(head) {
                            debug!(chain_id, head, "New head");
                        }
                    }
                    warn!(chain_id, "Head subscription ended, falling back to polling");
                }
                Ok(None) => debug!(chain_id, "No head subscription, polling only"),
                Err(err) => {
                    warn!(chain_id, error = %err, "Head subscription failed, polling only")
                }
            }
        })
    }
}

/// Resolves once shutdown is requested. A dropped sender never requests it.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
