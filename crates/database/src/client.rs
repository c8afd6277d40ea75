use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, RuntimeErr, TransactionTrait,
    sea_query::OnConflict, sqlx,
};
use store_sync::{CheckpointError, LogBatch};
use tracing::{error, info};

use crate::{SCHEMA_VERSION, entities::chain};

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Clone, Debug)]
pub struct DbClient {
    pub primary: DatabaseConnection,
    schema_version: String,
}

impl DbClient {
    pub fn new(primary: DatabaseConnection) -> Self {
        Self {
            primary,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    pub fn with_schema_version(mut self, schema_version: impl Into<String>) -> Self {
        self.schema_version = schema_version.into();
        self
    }

    pub fn current_schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Applies pending migrations.
    pub async fn migrate(&self) -> eyre::Result<()> {
        Migrator::up(&self.primary, None).await.map_err(|e| {
            error!("Failed to run migrations: {:?}", e);
            eyre::eyre!("Failed to run migrations: {:?}", e)
        })?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Rolls back every migration and re-applies them, leaving empty tables.
    pub async fn reset_schema(&self) -> eyre::Result<()> {
        Migrator::reset(&self.primary).await?;
        Migrator::up(&self.primary, None).await?;
        info!("Database schema recreated");
        Ok(())
    }

    pub async fn get_checkpoint(&self, chain_id: u64) -> Result<Option<chain::Model>, DbErr> {
        chain::Entity::find_by_id(chain_id as i64)
            .one(&self.primary)
            .await
    }

    /// Commits the batch's logs and moves the checkpoint to its last block in
    /// one transaction.
    pub async fn apply_log_batch(&self, batch: &LogBatch) -> eyre::Result<()> {
        let chain_id = db_int(batch.chain_id)?;
        let checkpoint_block = db_int(batch.checkpoint_block())?;

        let txn = self.primary.begin().await?;
        self.bulk_insert_logs(chain_id, &batch.logs, &txn).await?;

        let model = chain::ActiveModel {
            chain_id: Set(chain_id),
            schema_version: Set(self.schema_version.clone()),
            last_updated_block_number: Set(Some(checkpoint_block)),
            updated_at: Set(chrono::Utc::now().into()),
        };
        chain::Entity::insert(model)
            .on_conflict(
                OnConflict::column(chain::Column::ChainId)
                    .update_columns([
                        chain::Column::SchemaVersion,
                        chain::Column::LastUpdatedBlockNumber,
                        chain::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| {
                error!("Failed to upsert chain checkpoint: {:?}", e);
                eyre::eyre!("Failed to upsert chain checkpoint: {:?}", e)
            })?;

        txn.commit().await?;
        Ok(())
    }
}

pub(crate) fn db_int(value: u64) -> eyre::Result<i64> {
    i64::try_from(value).map_err(|_| eyre::eyre!("{value} does not fit in a BIGINT column"))
}

/// A missing relation means migrations never ran: the expected first-run state.
pub(crate) fn classify_read_error(err: DbErr) -> CheckpointError {
    if is_undefined_table(sqlstate(&err).as_deref()) {
        CheckpointError::BackendMissing(err.to_string())
    } else {
        CheckpointError::unavailable(err)
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let (DbErr::Query(runtime) | DbErr::Exec(runtime) | DbErr::Conn(runtime)) = err else {
        return None;
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db)) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

fn is_undefined_table(code: Option<&str>) -> bool {
    code == Some(UNDEFINED_TABLE)
}
