//! Upstream market feed abstraction.
//!
//! Raw payloads keep every field as an untyped JSON value: the feed mixes
//! numbers, numeric strings and nulls, and the normalizer decides what is
//! usable.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// One element of `/coins/markets` as delivered by the feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAsset {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub symbol: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub current_price: Option<Value>,
    #[serde(default)]
    pub market_cap: Option<Value>,
    #[serde(default)]
    pub market_cap_rank: Option<Value>,
    #[serde(default)]
    pub total_volume: Option<Value>,
    #[serde(default)]
    pub high_24h: Option<Value>,
    #[serde(default)]
    pub low_24h: Option<Value>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<Value>,
    #[serde(default)]
    pub circulating_supply: Option<Value>,
    #[serde(default)]
    pub total_supply: Option<Value>,
    #[serde(default)]
    pub max_supply: Option<Value>,
    #[serde(default)]
    pub ath: Option<Value>,
    #[serde(default)]
    pub ath_change_percentage: Option<Value>,
    #[serde(default)]
    pub atl: Option<Value>,
    #[serde(default)]
    pub atl_change_percentage: Option<Value>,
    #[serde(default)]
    pub last_updated: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalResponse {
    pub data: GlobalData,
}

/// Body of `/global`; currency maps are keyed by lower-case code ("usd")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalData {
    #[serde(default)]
    pub active_cryptocurrencies: Option<i64>,
    #[serde(default)]
    pub markets: Option<i64>,
    #[serde(default)]
    pub total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// One page of assets ordered by market cap, descending
    async fn fetch_markets(&self, page: u32, per_page: u32) -> Result<Vec<RawAsset>, FeedError>;

    async fn fetch_global(&self) -> Result<GlobalData, FeedError>;
}
