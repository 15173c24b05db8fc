use sea_orm_migration::prelude::*;

use crate::m20261001_000001_create_assets::Assets;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LatestPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LatestPrices::AssetId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LatestPrices::Symbol).string().not_null())
                    .col(ColumnDef::new(LatestPrices::Name).string().not_null())
                    .col(ColumnDef::new(LatestPrices::Price).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::Change24h).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::MarketCap).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::Volume24h).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::High24h).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::Low24h).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::CirculatingSupply).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::TotalSupply).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::MaxSupply).decimal().null())
                    .col(ColumnDef::new(LatestPrices::Ath).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::AthChange).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::Atl).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::AtlChange).decimal().not_null())
                    .col(ColumnDef::new(LatestPrices::MarketCapRank).integer().null())
                    .col(ColumnDef::new(LatestPrices::ImageUrl).text().null())
                    .col(ColumnDef::new(LatestPrices::QualityScore).double().not_null())
                    .col(
                        ColumnDef::new(LatestPrices::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LatestPrices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_latest_prices_asset")
                            .from(LatestPrices::Table, LatestPrices::AssetId)
                            .to(Assets::Table, Assets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_latest_prices_market_cap")
                    .table(LatestPrices::Table)
                    .col(LatestPrices::MarketCap)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LatestPrices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LatestPrices {
    Table,
    AssetId,
    Symbol,
    Name,
    Price,
    #[sea_orm(iden = "change_24h")]
    Change24h,
    MarketCap,
    #[sea_orm(iden = "volume_24h")]
    Volume24h,
    #[sea_orm(iden = "high_24h")]
    High24h,
    #[sea_orm(iden = "low_24h")]
    Low24h,
    CirculatingSupply,
    TotalSupply,
    MaxSupply,
    Ath,
    AthChange,
    Atl,
    AtlChange,
    MarketCapRank,
    ImageUrl,
    QualityScore,
    LastUpdated,
    UpdatedAt,
}
