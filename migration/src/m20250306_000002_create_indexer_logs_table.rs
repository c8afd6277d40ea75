use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IndexerLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IndexerLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IndexerLogs::ChainId).big_integer().not_null())
                    .col(
                        ColumnDef::new(IndexerLogs::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IndexerLogs::LogIndex).big_integer().not_null())
                    .col(ColumnDef::new(IndexerLogs::BlockHash).string())
                    .col(ColumnDef::new(IndexerLogs::TransactionHash).string())
                    .col(ColumnDef::new(IndexerLogs::Address).string().not_null())
                    .col(ColumnDef::new(IndexerLogs::Topic0).string())
                    .col(ColumnDef::new(IndexerLogs::Topics).json_binary().not_null())
                    .col(ColumnDef::new(IndexerLogs::Data).text().not_null())
                    .col(
                        ColumnDef::new(IndexerLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Re-applied batches rely on this to stay idempotent.
        manager
            .create_index(
                Index::create()
                    .name("idx_indexer_logs_position")
                    .table(IndexerLogs::Table)
                    .col(IndexerLogs::ChainId)
                    .col(IndexerLogs::BlockNumber)
                    .col(IndexerLogs::LogIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_indexer_logs_address")
                    .table(IndexerLogs::Table)
                    .col(IndexerLogs::ChainId)
                    .col(IndexerLogs::Address)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_indexer_logs_topic0")
                    .table(IndexerLogs::Table)
                    .col(IndexerLogs::ChainId)
                    .col(IndexerLogs::Topic0)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(IndexerLogs::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum IndexerLogs {
    Table,
    Id,
    ChainId,
    BlockNumber,
    LogIndex,
    BlockHash,
    TransactionHash,
    Address,
    Topic0,
    Topics,
    Data,
    CreatedAt,
}
