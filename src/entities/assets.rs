//! SeaORM Entity for tracked assets

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    /// Feed identifier, lower-cased (e.g. "bitcoin")
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price_history::Entity")]
    PriceHistory,
    #[sea_orm(has_one = "super::latest_prices::Entity")]
    LatestPrices,
}

impl Related<super::price_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceHistory.def()
    }
}

impl Related<super::latest_prices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LatestPrices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
