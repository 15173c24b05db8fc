use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decimal_to_f64;
use crate::entities::latest_prices;
use crate::services::normalizer::NormalizedAsset;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 250;
/// Keeps `(page - 1) * per_page` within a Postgres bigint OFFSET
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_SIZE;
pub const DEFAULT_HISTORY_DAYS: u32 = 7;
pub const MAX_HISTORY_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    MarketCap,
    Volume24h,
    Price,
    Change24h,
    Name,
    Symbol,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "market_cap" => Some(Self::MarketCap),
            "volume_24h" => Some(Self::Volume24h),
            "price" => Some(Self::Price),
            "change_24h" => Some(Self::Change24h),
            "name" => Some(Self::Name),
            "symbol" => Some(Self::Symbol),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query parameters for GET /api/assets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

impl AssetListQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.page == Some(0) {
            return Err("page must be at least 1".to_string());
        }

        if let Some(page) = self.page {
            if page > MAX_PAGE {
                return Err(format!("page must be at most {}, got {}", MAX_PAGE, page));
            }
        }

        if let Some(per_page) = self.per_page {
            if per_page < 1 || per_page > MAX_PAGE_SIZE {
                return Err(format!(
                    "per_page must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, per_page
                ));
            }
        }

        if let Some(sort_by) = &self.sort_by {
            if SortField::parse(sort_by).is_none() {
                return Err(format!(
                    "sort_by must be one of market_cap, volume_24h, price, change_24h, name, symbol, got '{}'",
                    sort_by
                ));
            }
        }

        if let Some(order) = &self.order {
            if order != "asc" && order != "desc" {
                return Err(format!("order must be 'asc' or 'desc', got '{}'", order));
            }
        }

        Ok(())
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip; saturates instead of overflowing for unvalidated input
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    pub fn sort_field(&self) -> SortField {
        self.sort_by
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or(SortField::MarketCap)
    }

    pub fn sort_order(&self) -> SortOrder {
        match self.order.as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    /// Trimmed search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// One asset as served to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image_url: Option<String>,
    pub market_cap_rank: Option<i32>,
    pub price: f64,
    /// Fraction, 0.025 = +2.5%
    pub change_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub max_supply: Option<f64>,
    pub ath: f64,
    pub atl: f64,
    pub quality_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl From<latest_prices::Model> for AssetResponse {
    fn from(row: latest_prices::Model) -> Self {
        Self {
            id: row.asset_id,
            symbol: row.symbol,
            name: row.name,
            image_url: row.image_url,
            market_cap_rank: row.market_cap_rank,
            price: decimal_to_f64(row.price),
            change_24h: decimal_to_f64(row.change_24h),
            market_cap: decimal_to_f64(row.market_cap),
            volume_24h: decimal_to_f64(row.volume_24h),
            high_24h: decimal_to_f64(row.high_24h),
            low_24h: decimal_to_f64(row.low_24h),
            circulating_supply: decimal_to_f64(row.circulating_supply),
            total_supply: decimal_to_f64(row.total_supply),
            max_supply: row.max_supply.map(decimal_to_f64),
            ath: decimal_to_f64(row.ath),
            atl: decimal_to_f64(row.atl),
            quality_score: row.quality_score,
            last_updated: row.last_updated.with_timezone(&Utc),
        }
    }
}

impl From<NormalizedAsset> for AssetResponse {
    fn from(asset: NormalizedAsset) -> Self {
        Self {
            id: asset.id,
            symbol: asset.symbol,
            name: asset.name,
            image_url: asset.image_url,
            market_cap_rank: asset.market_cap_rank,
            price: decimal_to_f64(asset.price),
            change_24h: decimal_to_f64(asset.change_24h),
            market_cap: decimal_to_f64(asset.market_cap),
            volume_24h: decimal_to_f64(asset.volume_24h),
            high_24h: decimal_to_f64(asset.high_24h),
            low_24h: decimal_to_f64(asset.low_24h),
            circulating_supply: decimal_to_f64(asset.circulating_supply),
            total_supply: decimal_to_f64(asset.total_supply),
            max_supply: asset.max_supply.map(decimal_to_f64),
            ath: decimal_to_f64(asset.ath),
            atl: decimal_to_f64(asset.atl),
            quality_score: asset.quality_score,
            last_updated: asset.last_updated,
        }
    }
}

/// Query parameters for GET /api/assets/{id_or_symbol}/history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

impl HistoryQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(days) = self.days {
            if days < 1 || days > MAX_HISTORY_DAYS {
                return Err(format!(
                    "days must be between 1 and {}, got {}",
                    MAX_HISTORY_DAYS, days
                ));
            }
        }
        Ok(())
    }

    pub fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_HISTORY_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub id: String,
    pub symbol: String,
    pub days: u32,
    pub points: Vec<HistoryPoint>,
}
