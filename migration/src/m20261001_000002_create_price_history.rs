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
                    .table(PriceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceHistory::AssetId).string().not_null())
                    .col(ColumnDef::new(PriceHistory::Price).decimal().not_null())
                    .col(ColumnDef::new(PriceHistory::Change24h).decimal().not_null())
                    .col(ColumnDef::new(PriceHistory::MarketCap).decimal().not_null())
                    .col(ColumnDef::new(PriceHistory::Volume24h).decimal().not_null())
                    .col(
                        ColumnDef::new(PriceHistory::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_price_history_asset")
                            .from(PriceHistory::Table, PriceHistory::AssetId)
                            .to(Assets::Table, Assets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One observation per asset and source timestamp; re-runs are ignored
        manager
            .create_index(
                Index::create()
                    .name("idx_price_history_asset_observation")
                    .table(PriceHistory::Table)
                    .col(PriceHistory::AssetId)
                    .col(PriceHistory::LastUpdated)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PriceHistory {
    Table,
    Id,
    AssetId,
    Price,
    #[sea_orm(iden = "change_24h")]
    Change24h,
    MarketCap,
    #[sea_orm(iden = "volume_24h")]
    Volume24h,
    LastUpdated,
    RecordedAt,
}
