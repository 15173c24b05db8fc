//! Market aggregate computed from the latest snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::services::feed::GlobalData;

/// Number of assets listed individually in the dominance map
pub const DOMINANCE_TOP_N: usize = 10;

pub const BITCOIN_ID: &str = "bitcoin";
pub const ETHEREUM_ID: &str = "ethereum";

/// Bucket floors in USD
const LARGE_CAP_FLOOR: i64 = 10_000_000_000;
const MID_CAP_FLOOR: i64 = 1_000_000_000;

/// The columns of a snapshot row the aggregate needs
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFigures {
    pub asset_id: String,
    pub symbol: String,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapDistribution {
    /// market cap > 10B
    pub large: u32,
    /// 1B < market cap <= 10B
    pub mid: u32,
    /// 0 < market cap <= 1B
    pub small: u32,
}

/// Totals reported by the feed's own `/global` endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedTotals {
    pub total_market_cap: Option<Decimal>,
    pub active_assets: Option<i32>,
    pub dominance: BTreeMap<String, f64>,
}

impl From<&GlobalData> for FeedTotals {
    fn from(global: &GlobalData) -> Self {
        Self {
            total_market_cap: global
                .total_market_cap
                .get("usd")
                .and_then(|v| Decimal::from_f64(*v)),
            active_assets: global
                .active_cryptocurrencies
                .and_then(|n| i32::try_from(n).ok()),
            dominance: global
                .market_cap_percentage
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketAggregate {
    pub total_market_cap: Decimal,
    pub total_volume_24h: Decimal,
    pub active_assets: i32,
    pub btc_dominance: Decimal,
    pub eth_dominance: Decimal,
    /// Symbol -> percent of total market cap, ten largest assets
    pub dominance: BTreeMap<String, Decimal>,
    pub distribution: CapDistribution,
    pub feed: Option<FeedTotals>,
}

/// Aggregate over every row of the current snapshot.
pub fn compute(assets: &[AssetFigures]) -> MarketAggregate {
    let total_market_cap: Decimal = assets.iter().map(|a| a.market_cap).sum();
    let total_volume_24h: Decimal = assets.iter().map(|a| a.volume_24h).sum();

    let large_floor = Decimal::from(LARGE_CAP_FLOOR);
    let mid_floor = Decimal::from(MID_CAP_FLOOR);

    let mut distribution = CapDistribution::default();
    let mut active_assets = 0;
    for asset in assets {
        if asset.market_cap > Decimal::ZERO {
            active_assets += 1;
        }
        if asset.market_cap > large_floor {
            distribution.large += 1;
        } else if asset.market_cap > mid_floor {
            distribution.mid += 1;
        } else if asset.market_cap > Decimal::ZERO {
            distribution.small += 1;
        }
    }

    let share_of = |id: &str| {
        let cap: Decimal = assets
            .iter()
            .filter(|a| a.asset_id == id)
            .map(|a| a.market_cap)
            .sum();
        dominance(cap, total_market_cap)
    };

    let mut ranked: Vec<&AssetFigures> = assets.iter().collect();
    ranked.sort_by(|a, b| {
        b.market_cap
            .cmp(&a.market_cap)
            .then_with(|| a.asset_id.cmp(&b.asset_id))
    });

    let mut top = BTreeMap::new();
    for asset in ranked.into_iter().take(DOMINANCE_TOP_N) {
        top.entry(asset.symbol.clone())
            .or_insert_with(|| dominance(asset.market_cap, total_market_cap));
    }

    MarketAggregate {
        total_market_cap,
        total_volume_24h,
        active_assets,
        btc_dominance: share_of(BITCOIN_ID),
        eth_dominance: share_of(ETHEREUM_ID),
        dominance: top,
        distribution,
        feed: None,
    }
}

/// Percent of `total`, rounded to two places; zero when the total is zero
pub fn dominance(market_cap: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (market_cap / total * Decimal::ONE_HUNDRED).round_dp(2)
}
