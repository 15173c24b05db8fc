use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per computed aggregate; rows are never updated
        manager
            .create_table(
                Table::create()
                    .table(MarketStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MarketStats::TotalMarketCap).decimal().not_null())
                    .col(ColumnDef::new(MarketStats::TotalVolume24h).decimal().not_null())
                    .col(ColumnDef::new(MarketStats::ActiveAssets).integer().not_null())
                    .col(ColumnDef::new(MarketStats::BtcDominance).decimal().not_null())
                    .col(ColumnDef::new(MarketStats::EthDominance).decimal().not_null())
                    .col(ColumnDef::new(MarketStats::Dominance).json_binary().not_null())
                    .col(ColumnDef::new(MarketStats::CapDistribution).json_binary().not_null())
                    .col(ColumnDef::new(MarketStats::FeedTotalMarketCap).decimal().null())
                    .col(ColumnDef::new(MarketStats::FeedActiveAssets).integer().null())
                    .col(ColumnDef::new(MarketStats::FeedDominance).json_binary().null())
                    .col(
                        ColumnDef::new(MarketStats::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_market_stats_recorded_at")
                    .table(MarketStats::Table)
                    .col(MarketStats::RecordedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MarketStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MarketStats {
    Table,
    Id,
    TotalMarketCap,
    #[sea_orm(iden = "total_volume_24h")]
    TotalVolume24h,
    ActiveAssets,
    BtcDominance,
    EthDominance,
    Dominance,
    CapDistribution,
    FeedTotalMarketCap,
    FeedActiveAssets,
    FeedDominance,
    RecordedAt,
}
