use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IndexerChain::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IndexerChain::ChainId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IndexerChain::SchemaVersion)
                            .string()
                            .not_null(),
                    )
                    // NULL until the first batch lands
                    .col(ColumnDef::new(IndexerChain::LastUpdatedBlockNumber).big_integer())
                    .col(
                        ColumnDef::new(IndexerChain::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(IndexerChain::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum IndexerChain {
    Table,
    ChainId,
    SchemaVersion,
    LastUpdatedBlockNumber,
    UpdatedAt,
}
