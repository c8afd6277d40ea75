use std::sync::Arc;

use api_lib::{start_api, AppState};
use common::{
    config::{IndexerConfig, LoadFromEnv},
    telemetry::init_tracing,
};
use database::client::DbClient;
use evm::{EvmChainClient, FallbackProvider};
use eyre::{Result, WrapErr};
use store_sync::{
    observe_caught_up, resume, AppliedBatch, ChainClient, SyncEngine, SyncOptions,
};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    watch,
};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = IndexerConfig::load()?;
    init_tracing(&cfg.log);

    let provider = FallbackProvider::connect(&cfg.rpc).await?;
    info!(transports = ?provider.transport_kinds(), "RPC provider ready");
    let address = EvmChainClient::parse_address(cfg.sync.address.as_deref())?;
    let chain = Arc::new(EvmChainClient::new(provider, address));
    let chain_id = chain
        .chain_id()
        .await
        .wrap_err("Chain RPC unreachable at startup")?;
    info!(chain_id, "Connected to chain");

    let db_conn =
        database::connect::connect(&cfg.database.url, cfg.database.max_connections).await?;
    info!("Connected to Indexer's DB");
    let db = Arc::new(DbClient::new(db_conn));

    // The checkpoint is read before migrations so a fresh database shows up
    // as a first run rather than an empty row.
    let cursor = resume::prepare(db.as_ref(), chain_id, cfg.sync.start_block)
        .await
        .wrap_err("Failed to prepare storage")?;
    db.migrate().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let options = SyncOptions {
        max_block_range: cfg.sync.max_block_range,
        poll_interval: cfg.sync.poll_interval(),
        request_timeout: cfg.rpc.request_timeout(),
        retry_min_delay: cfg.sync.retry_min_delay(),
        retry_max_delay: cfg.sync.retry_max_delay(),
        ..Default::default()
    }
    .starting_at(cursor);
    let sync = SyncEngine::start(chain_id, chain, db.clone(), options, shutdown_rx.clone());
    let caught_up = observe_caught_up(&sync.progress);
    tokio::spawn(log_batches(sync.progress.subscribe_batches()));

    let state = AppState {
        chain_id,
        schema_version: db.current_schema_version().to_string(),
        query: db.clone(),
        progress: sync.progress.clone(),
        caught_up,
    };
    let host = cfg.server.host.clone();
    let port = cfg.server.port;
    let mut api_task = tokio::spawn(async move { start_api(state, &host, port, shutdown_rx).await });
    let mut sync_task = sync.task;

    let mut sync_done = None;
    let mut api_done = None;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.wrap_err("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        res = &mut sync_task => {
            warn!("Sync task exited");
            sync_done = Some(res);
        }
        res = &mut api_task => {
            warn!("API task exited");
            api_done = Some(res);
        }
    }
    shutdown_tx.send_replace(true);

    let sync_result = match sync_done {
        Some(res) => res,
        None => sync_task.await,
    };
    let api_result = match api_done {
        Some(res) => res,
        None => api_task.await,
    };
    sync_result.wrap_err("Sync task panicked")??;
    api_result.wrap_err("API task panicked")??;

    info!("Indexer stopped");
    Ok(())
}

/// Keeps a running total of indexed logs from the applied-batch feed.
async fn log_batches(mut batches: broadcast::Receiver<AppliedBatch>) {
    let mut total_logs = 0usize;

    loop {
        match batches.recv().await {
            Ok(batch) => {
                total_logs += batch.log_count;
                debug!(
                    to = batch.range.to,
                    logs = batch.log_count,
                    total_logs,
                    "Batch committed"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Batch feed lagged, total is now a lower bound");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
