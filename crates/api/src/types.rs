use database::entities::log;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LogResponse {
    pub block_number: i64,
    pub log_index: i64,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub indexed_at: DateTimeWithTimeZone,
}

impl TryFrom<log::Model> for LogResponse {
    type Error = serde_json::Error;

    fn try_from(model: log::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            block_number: model.block_number,
            log_index: model.log_index,
            block_hash: model.block_hash,
            transaction_hash: model.transaction_hash,
            address: model.address,
            topics: serde_json::from_value(model.topics)?,
            data: model.data,
            indexed_at: model.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub chain_id: u64,
    pub schema_version: String,
    pub checkpoint_block: Option<i64>,
    pub latest_chain_block: Option<u64>,
    pub last_applied_block: Option<u64>,
    pub caught_up: bool,
}
