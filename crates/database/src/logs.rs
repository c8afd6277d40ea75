use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::OnConflict,
};
use store_sync::LogRecord;
use tracing::error;

use crate::{
    client::{DbClient, db_int},
    entities::log,
};

/// Rows per INSERT, keeping well under the PostgreSQL parameter limit.
const INSERT_CHUNK_SIZE: usize = 1000;

/// Query over indexed logs of one chain, ordered by chain position.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub chain_id: u64,
    pub address: Option<String>,
    pub topic0: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    /// Only logs strictly after this `(block_number, log_index)`.
    pub after: Option<(u64, u64)>,
    pub limit: u64,
}

/// Generic utility for processing database operations in batches to avoid PostgreSQL parameter limits
async fn process_in_batches<T, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    operation: F,
) -> eyre::Result<()>
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: std::future::Future<Output = eyre::Result<()>>,
{
    for chunk in items.chunks(batch_size) {
        operation(chunk.to_vec()).await?;
    }
    Ok(())
}

fn to_active_model(chain_id: i64, record: &LogRecord) -> eyre::Result<log::ActiveModel> {
    Ok(log::ActiveModel {
        chain_id: Set(chain_id),
        block_number: Set(db_int(record.block_number)?),
        log_index: Set(db_int(record.log_index)?),
        block_hash: Set(record.block_hash.clone()),
        transaction_hash: Set(record.transaction_hash.clone()),
        address: Set(record.address.to_lowercase()),
        topic0: Set(record.topic0().map(str::to_lowercase)),
        topics: Set(serde_json::to_value(&record.topics)?),
        data: Set(record.data.clone()),
        ..Default::default()
    })
}

fn filter_int(value: u64) -> Result<i64, DbErr> {
    i64::try_from(value).map_err(|_| DbErr::Custom(format!("{value} is out of range for a log filter")))
}

impl DbClient {
    /// Inserts logs, skipping any already stored at the same chain position.
    pub async fn bulk_insert_logs(
        &self,
        chain_id: i64,
        records: &[LogRecord],
        txn: &DatabaseTransaction,
    ) -> eyre::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let models = records
            .iter()
            .map(|record| to_active_model(chain_id, record))
            .collect::<eyre::Result<Vec<_>>>()?;

        process_in_batches(models, INSERT_CHUNK_SIZE, |chunk| async move {
            log::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([
                        log::Column::ChainId,
                        log::Column::BlockNumber,
                        log::Column::LogIndex,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(txn)
                .await
                .map_err(|e: DbErr| {
                    error!("Failed to bulk insert logs: {:?}", e);
                    eyre::eyre!("Failed to bulk insert logs: {:?}", e)
                })?;
            Ok::<_, eyre::Report>(())
        })
        .await
    }

    pub async fn fetch_logs(&self, filter: &LogFilter) -> Result<Vec<log::Model>, DbErr> {
        let mut query =
            log::Entity::find().filter(log::Column::ChainId.eq(filter_int(filter.chain_id)?));

        if let Some(address) = &filter.address {
            query = query.filter(log::Column::Address.eq(address.to_lowercase()));
        }
        if let Some(topic0) = &filter.topic0 {
            query = query.filter(log::Column::Topic0.eq(topic0.to_lowercase()));
        }
        if let Some(from_block) = filter.from_block {
            query = query.filter(log::Column::BlockNumber.gte(filter_int(from_block)?));
        }
        if let Some(to_block) = filter.to_block {
            query = query.filter(log::Column::BlockNumber.lte(filter_int(to_block)?));
        }
        if let Some((block_number, log_index)) = filter.after {
            query = query.filter(
                Condition::any()
                    .add(log::Column::BlockNumber.gt(filter_int(block_number)?))
                    .add(
                        Condition::all()
                            .add(log::Column::BlockNumber.eq(filter_int(block_number)?))
                            .add(log::Column::LogIndex.gt(filter_int(log_index)?)),
                    ),
            );
        }

        query
            .order_by_asc(log::Column::BlockNumber)
            .order_by_asc(log::Column::LogIndex)
            .limit(filter.limit)
            .all(&self.primary)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_model_normalizes_hex_case() {
        let record = LogRecord {
            block_number: 7,
            log_index: 2,
            block_hash: None,
            transaction_hash: Some("0xabc".into()),
            address: "0xDeaDbeef00000000000000000000000000000000".into(),
            topics: vec!["0xDDF252AD".into(), "0x01".into()],
            data: "0x".into(),
        };

        let model = to_active_model(1, &record).unwrap();
        assert_eq!(
            model.address,
            Set("0xdeadbeef00000000000000000000000000000000".to_string())
        );
        assert_eq!(model.topic0, Set(Some("0xddf252ad".to_string())));
        assert_eq!(
            model.topics,
            Set(serde_json::json!(["0xDDF252AD", "0x01"]))
        );
        assert_eq!(model.block_number, Set(7));
    }

    #[test]
    fn oversized_filter_values_are_rejected() {
        assert_eq!(filter_int(i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(filter_int(i64::MAX as u64 + 1), Err(DbErr::Custom(_))));
    }

    #[tokio::test]
    async fn chunks_are_processed_in_order() {
        let seen = std::sync::Mutex::new(Vec::new());
        process_in_batches((0..5).collect(), 2, |chunk: Vec<i32>| {
            let seen = &seen;
            async move {
                seen.lock().unwrap().push(chunk);
                Ok::<_, eyre::Report>(())
            }
        })
        .await
        .unwrap();
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
    }
}
