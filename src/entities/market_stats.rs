//! SeaORM Entity for persisted market aggregates

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "market_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub total_market_cap: Decimal,
    pub total_volume_24h: Decimal,
    pub active_assets: i32,
    /// Percent of total market cap
    pub btc_dominance: Decimal,
    pub eth_dominance: Decimal,
    /// Symbol -> percent for the ten largest assets
    #[sea_orm(column_type = "JsonBinary")]
    pub dominance: Json,
    /// {"large": n, "mid": n, "small": n}
    #[sea_orm(column_type = "JsonBinary")]
    pub cap_distribution: Json,
    pub feed_total_market_cap: Option<Decimal>,
    pub feed_active_assets: Option<i32>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub feed_dominance: Option<Json>,
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
