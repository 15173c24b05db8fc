//! SeaORM Entity for the most-recent-per-asset snapshot

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "latest_prices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub change_24h: Decimal,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub circulating_supply: Decimal,
    pub total_supply: Decimal,
    pub max_supply: Option<Decimal>,
    pub ath: Decimal,
    /// Distance from the all-time high as a fraction
    pub ath_change: Decimal,
    pub atl: Decimal,
    pub atl_change: Decimal,
    pub market_cap_rank: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_url: Option<String>,
    /// 0-100, lowered for every field the feed left out
    #[sea_orm(column_type = "Double")]
    pub quality_score: f64,
    pub last_updated: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assets::Entity",
        from = "Column::AssetId",
        to = "super::assets::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Assets,
}

impl Related<super::assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
