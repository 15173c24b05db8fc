//! Persistence for ingested market data.
//!
//! Each batch is written in three statements: the parent `assets` rows, the
//! append-only `price_history` rows, and the `latest_prices` snapshot. There
//! is no surrounding transaction; every statement is atomic on its own and a
//! retried batch converges to the same rows.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, QuerySelect, Set,
};
use serde_json::{Map, Value};

use crate::entities::{assets, latest_prices, market_stats, price_history};
use crate::services::aggregate::{AssetFigures, MarketAggregate};
use crate::services::normalizer::NormalizedAsset;

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Upsert parents, append history, refresh the snapshot
    async fn upsert_batch(&self, batch: &[NormalizedAsset]) -> Result<(), DbErr>;

    /// Figures of every row currently in `latest_prices`
    async fn latest_snapshot(&self) -> Result<Vec<AssetFigures>, DbErr>;

    async fn insert_market_stats(&self, aggregate: &MarketAggregate) -> Result<(), DbErr>;
}

#[derive(Clone)]
pub struct PgMarketStore {
    db: DatabaseConnection,
}

impl PgMarketStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn upsert_batch(&self, batch: &[NormalizedAsset]) -> Result<(), DbErr> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().fixed_offset();

        let parents = batch.iter().map(|a| assets::ActiveModel {
            id: Set(a.id.clone()),
            symbol: Set(a.symbol.clone()),
            name: Set(a.name.clone()),
            image_url: Set(a.image_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        });

        assets::Entity::insert_many(parents)
            .on_conflict(
                OnConflict::column(assets::Column::Id)
                    .update_columns([
                        assets::Column::Symbol,
                        assets::Column::Name,
                        assets::Column::ImageUrl,
                        assets::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let history = batch.iter().map(|a| price_history::ActiveModel {
            asset_id: Set(a.id.clone()),
            price: Set(a.price),
            change_24h: Set(a.change_24h),
            market_cap: Set(a.market_cap),
            volume_24h: Set(a.volume_24h),
            last_updated: Set(a.last_updated.fixed_offset()),
            recorded_at: Set(now),
            ..Default::default()
        });

        // Same (asset, last_updated) observed twice is ignored, never rewritten
        let appended = price_history::Entity::insert_many(history)
            .on_conflict(
                OnConflict::columns([
                    price_history::Column::AssetId,
                    price_history::Column::LastUpdated,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let snapshot = batch.iter().map(|a| latest_prices::ActiveModel {
            asset_id: Set(a.id.clone()),
            symbol: Set(a.symbol.clone()),
            name: Set(a.name.clone()),
            price: Set(a.price),
            change_24h: Set(a.change_24h),
            market_cap: Set(a.market_cap),
            volume_24h: Set(a.volume_24h),
            high_24h: Set(a.high_24h),
            low_24h: Set(a.low_24h),
            circulating_supply: Set(a.circulating_supply),
            total_supply: Set(a.total_supply),
            max_supply: Set(a.max_supply),
            ath: Set(a.ath),
            ath_change: Set(a.ath_change),
            atl: Set(a.atl),
            atl_change: Set(a.atl_change),
            market_cap_rank: Set(a.market_cap_rank),
            image_url: Set(a.image_url.clone()),
            quality_score: Set(a.quality_score),
            last_updated: Set(a.last_updated.fixed_offset()),
            updated_at: Set(now),
        });

        // An older observation never replaces a newer snapshot row
        latest_prices::Entity::insert_many(snapshot)
            .on_conflict(
                OnConflict::column(latest_prices::Column::AssetId)
                    .update_columns([
                        latest_prices::Column::Symbol,
                        latest_prices::Column::Name,
                        latest_prices::Column::Price,
                        latest_prices::Column::Change24h,
                        latest_prices::Column::MarketCap,
                        latest_prices::Column::Volume24h,
                        latest_prices::Column::High24h,
                        latest_prices::Column::Low24h,
                        latest_prices::Column::CirculatingSupply,
                        latest_prices::Column::TotalSupply,
                        latest_prices::Column::MaxSupply,
                        latest_prices::Column::Ath,
                        latest_prices::Column::AthChange,
                        latest_prices::Column::Atl,
                        latest_prices::Column::AtlChange,
                        latest_prices::Column::MarketCapRank,
                        latest_prices::Column::ImageUrl,
                        latest_prices::Column::QualityScore,
                        latest_prices::Column::LastUpdated,
                        latest_prices::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((latest_prices::Entity, latest_prices::Column::LastUpdated)).lte(
                            Expr::col((Alias::new("excluded"), latest_prices::Column::LastUpdated)),
                        ),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        tracing::debug!(
            batch_size = batch.len(),
            history_rows = appended,
            "Upserted asset batch"
        );

        Ok(())
    }

    async fn latest_snapshot(&self) -> Result<Vec<AssetFigures>, DbErr> {
        let rows: Vec<(String, String, Decimal, Decimal)> = latest_prices::Entity::find()
            .select_only()
            .columns([
                latest_prices::Column::AssetId,
                latest_prices::Column::Symbol,
                latest_prices::Column::MarketCap,
                latest_prices::Column::Volume24h,
            ])
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(asset_id, symbol, market_cap, volume_24h)| AssetFigures {
                asset_id,
                symbol,
                market_cap,
                volume_24h,
            })
            .collect())
    }

    async fn insert_market_stats(&self, aggregate: &MarketAggregate) -> Result<(), DbErr> {
        let dominance: Map<String, Value> = aggregate
            .dominance
            .iter()
            .map(|(symbol, pct)| (symbol.clone(), Value::from(pct.to_f64().unwrap_or_default())))
            .collect();

        let cap_distribution = serde_json::to_value(&aggregate.distribution)
            .map_err(|e| DbErr::Custom(format!("cap distribution: {}", e)))?;

        let feed = aggregate.feed.as_ref();
        let feed_dominance = feed.map(|f| {
            Value::Object(
                f.dominance
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(*v)))
                    .collect(),
            )
        });

        let row = market_stats::ActiveModel {
            total_market_cap: Set(aggregate.total_market_cap),
            total_volume_24h: Set(aggregate.total_volume_24h),
            active_assets: Set(aggregate.active_assets),
            btc_dominance: Set(aggregate.btc_dominance),
            eth_dominance: Set(aggregate.eth_dominance),
            dominance: Set(Value::Object(dominance)),
            cap_distribution: Set(cap_distribution),
            feed_total_market_cap: Set(feed.and_then(|f| f.total_market_cap)),
            feed_active_assets: Set(feed.and_then(|f| f.active_assets)),
            feed_dominance: Set(feed_dominance),
            recorded_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };

        row.insert(&self.db).await?;

        Ok(())
    }
}
