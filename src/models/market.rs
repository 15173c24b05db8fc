use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decimal_to_f64;
use crate::entities::market_stats;
use crate::services::feed::GlobalData;

pub const TOP_MOVERS_LIMIT: i32 = 5;
pub const DEFAULT_SNAPSHOT_LIMIT: u64 = 24;
pub const MAX_SNAPSHOT_LIMIT: u64 = 500;

/// Largest 24h price movers, as returned by get_top_gainers/get_top_losers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverResponse {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatsResponse {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub active_assets: i64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub top_gainers: Vec<MoverResponse>,
    pub top_losers: Vec<MoverResponse>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Query parameters for GET /api/market/snapshots
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotQuery {
    pub limit: Option<u64>,
}

impl SnapshotQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(limit) = self.limit {
            if limit < 1 || limit > MAX_SNAPSHOT_LIMIT {
                return Err(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_SNAPSHOT_LIMIT, limit
                ));
            }
        }
        Ok(())
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_SNAPSHOT_LIMIT)
    }
}

/// A persisted market aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshotResponse {
    pub id: i64,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub active_assets: i32,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub dominance: serde_json::Value,
    pub cap_distribution: serde_json::Value,
    pub feed_total_market_cap: Option<f64>,
    pub feed_active_assets: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl From<market_stats::Model> for MarketSnapshotResponse {
    fn from(row: market_stats::Model) -> Self {
        Self {
            id: row.id,
            total_market_cap: decimal_to_f64(row.total_market_cap),
            total_volume_24h: decimal_to_f64(row.total_volume_24h),
            active_assets: row.active_assets,
            btc_dominance: decimal_to_f64(row.btc_dominance),
            eth_dominance: decimal_to_f64(row.eth_dominance),
            dominance: row.dominance,
            cap_distribution: row.cap_distribution,
            feed_total_market_cap: row.feed_total_market_cap.map(decimal_to_f64),
            feed_active_assets: row.feed_active_assets,
            recorded_at: row.recorded_at.with_timezone(&Utc),
        }
    }
}

/// Query parameters for GET /api/live/markets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveMarketsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl LiveMarketsQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.page == Some(0) {
            return Err("page must be at least 1".to_string());
        }
        if let Some(per_page) = self.per_page {
            if per_page < 1 || per_page > 250 {
                return Err(format!("per_page must be between 1 and 250, got {}", per_page));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(100)
    }
}

/// Global aggregate straight from the feed, reshaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMarketResponse {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub active_assets: Option<i64>,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    /// Fraction, like every other change field
    pub market_cap_change_24h: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<GlobalData> for GlobalMarketResponse {
    fn from(global: GlobalData) -> Self {
        let usd = |map: &std::collections::HashMap<String, f64>| map.get("usd").copied().unwrap_or_default();

        Self {
            total_market_cap: usd(&global.total_market_cap),
            total_volume_24h: usd(&global.total_volume),
            active_assets: global.active_cryptocurrencies,
            btc_dominance: global.market_cap_percentage.get("btc").copied().unwrap_or_default(),
            eth_dominance: global.market_cap_percentage.get("eth").copied().unwrap_or_default(),
            market_cap_change_24h: global.market_cap_change_percentage_24h_usd.map(|pct| pct / 100.0),
            last_updated: global
                .updated_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}
