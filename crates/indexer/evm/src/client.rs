use alloy::{
    hex,
    primitives::Address,
    rpc::types::{Filter, Log},
};
use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use store_sync::{BlockRange, ChainClient, LogRecord};
use tracing::{debug, instrument};

use crate::{error::ParserError, provider::FallbackProvider};

/// [`ChainClient`] over an EVM JSON-RPC endpoint, optionally restricted to a
/// single contract address.
#[derive(Clone)]
pub struct EvmChainClient {
    provider: FallbackProvider,
    address: Option<Address>,
}

impl EvmChainClient {
    pub fn new(provider: FallbackProvider, address: Option<Address>) -> Self {
        Self { provider, address }
    }

    /// Parses an optional `0x` address filter, as found in configuration.
    pub fn parse_address(value: Option<&str>) -> Result<Option<Address>, ParserError> {
        value
            .map(|raw| {
                raw.parse::<Address>()
                    .map_err(|_| ParserError::InvalidAddress {
                        value: raw.to_string(),
                    })
            })
            .transpose()
    }

    fn filter(&self, range: BlockRange) -> Filter {
        let filter = Filter::new().from_block(range.from).to_block(range.to);
        match self.address {
            Some(address) => filter.address(address),
            None => filter,
        }
    }
}

pub fn to_log_record(log: &Log) -> Result<LogRecord, ParserError> {
    let block_number = log.block_number.ok_or(ParserError::MissingBlockNumber)?;
    let log_index = log
        .log_index
        .ok_or(ParserError::MissingLogIndex { block_number })?;

    Ok(LogRecord {
        block_number,
        log_index,
        block_hash: log.block_hash.map(|hash| format!("{hash:#x}")),
        transaction_hash: log.transaction_hash.map(|hash| format!("{hash:#x}")),
        address: format!("{:#x}", log.address()),
        topics: log
            .topics()
            .iter()
            .map(|topic| format!("{topic:#x}"))
            .collect(),
        data: hex::encode_prefixed(&log.data().data),
    })
}

#[async_trait]
impl ChainClient for EvmChainClient {
    async fn chain_id(&self) -> eyre::Result<u64> {
        self.provider
            .request("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
    }

    async fn latest_block_number(&self) -> eyre::Result<u64> {
        self.provider
            .request("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    #[instrument(skip_all, fields(range = %range))]
    async fn get_logs(&self, range: BlockRange) -> eyre::Result<Vec<LogRecord>> {
        let filter = self.filter(range);
        let logs = self
            .provider
            .request("eth_getLogs", |p| {
                let filter = filter.clone();
                async move { p.get_logs(&filter).await }
            })
            .await?;

        let records = logs
            .iter()
            // Removed logs belong to a reorged block and are not part of the range.
            .filter(|log| !log.removed)
            .map(to_log_record)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(logs = records.len(), "Fetched logs");
        Ok(records)
    }

    async fn subscribe_heads(&self) -> eyre::Result<Option<BoxStream<'static, u64>>> {
        let Some(ws) = self.provider.pubsub() else {
            return Ok(None);
        };
        let subscription = ws.subscribe_blocks().await?;
        let heads = subscription
            .into_stream()
            .map(|header| header.inner.number)
            .boxed();
        Ok(Some(heads))
    }
}
