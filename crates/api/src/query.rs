use async_trait::async_trait;
use database::{
    client::DbClient,
    entities::{chain, log},
    logs::LogFilter,
};
use sea_orm::DbErr;

/// Read side of the storage backend used by the HTTP handlers.
#[async_trait]
pub trait QueryAdapter: Send + Sync {
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<log::Model>, DbErr>;

    async fn checkpoint(&self, chain_id: u64) -> Result<Option<chain::Model>, DbErr>;
}

#[async_trait]
impl QueryAdapter for DbClient {
    async fn logs(&self, filter: &LogFilter) -> Result<Vec<log::Model>, DbErr> {
        self.fetch_logs(filter).await
    }

    async fn checkpoint(&self, chain_id: u64) -> Result<Option<chain::Model>, DbErr> {
        self.get_checkpoint(chain_id).await
    }
}
