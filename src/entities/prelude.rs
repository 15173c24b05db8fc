//! `SeaORM` Entity prelude

pub use super::assets::Entity as Assets;
pub use super::latest_prices::Entity as LatestPrices;
pub use super::market_stats::Entity as MarketStats;
pub use super::price_history::Entity as PriceHistory;
pub use super::sync_status::Entity as SyncStatus;
