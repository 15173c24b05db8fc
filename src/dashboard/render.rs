use std::cmp::Ordering;

use prettytable::{Table, format, row};

use super::state::{DashboardState, Phase};
use crate::models::asset::AssetResponse;
use crate::models::market::MarketStatsResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Rank,
    Name,
    Price,
    Change,
    MarketCap,
    Volume,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rank" | "#" => Some(Self::Rank),
            "name" => Some(Self::Name),
            "price" => Some(Self::Price),
            "change" | "24h" => Some(Self::Change),
            "cap" | "market_cap" => Some(Self::MarketCap),
            "volume" | "vol" => Some(Self::Volume),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSort {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for TableSort {
    fn default() -> Self {
        Self {
            key: SortKey::Rank,
            descending: false,
        }
    }
}

impl TableSort {
    /// Selecting the active column flips the direction; a new column starts
    /// in its natural direction.
    pub fn select(self, key: SortKey) -> Self {
        if key == self.key {
            Self {
                key,
                descending: !self.descending,
            }
        } else {
            Self {
                key,
                descending: !matches!(key, SortKey::Rank | SortKey::Name),
            }
        }
    }
}

pub fn sort_assets(assets: &mut [AssetResponse], sort: TableSort) {
    assets.sort_by(|a, b| {
        let ordering = match sort.key {
            // Unranked assets go last in ascending order
            SortKey::Rank => match (a.market_cap_rank, b.market_cap_rank) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Price => a.price.total_cmp(&b.price),
            SortKey::Change => a.change_24h.total_cmp(&b.change_24h),
            SortKey::MarketCap => a.market_cap.total_cmp(&b.market_cap),
            SortKey::Volume => a.volume_24h.total_cmp(&b.volume_24h),
        };
        let ordering = if sort.descending {
            ordering.reverse()
        } else {
            ordering
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    });
}

/// Full screen for the current state
pub fn render(state: &DashboardState, sort: TableSort) -> String {
    let mut out = String::new();

    match state.phase {
        Phase::Loading => out.push_str("Loading market data...\n"),
        Phase::Refreshing => out.push_str("Refreshing...\n"),
        Phase::Error => out.push_str(&error_panel(state.error.as_deref())),
        Phase::Ready => {}
    }

    if let Some(data) = &state.data {
        out.push_str(&summary_cards(&data.stats));
        out.push('\n');

        let mut assets = data.assets.clone();
        sort_assets(&mut assets, sort);
        out.push_str(&asset_table(&assets));
    }

    if let Some(ts) = state.last_refreshed {
        out.push_str(&format!("Last updated {}\n", ts.format("%Y-%m-%d %H:%M:%S UTC")));
    }

    out
}

pub fn error_panel(message: Option<&str>) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(row![format!(
        "Failed to load market data: {}",
        message.unwrap_or("unknown error")
    )]);
    table.add_row(row!["Press 'r' then Enter to retry"]);
    table.to_string()
}

pub fn summary_cards(stats: &MarketStatsResponse) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row![
        "Total Market Cap",
        "24h Volume",
        "BTC Dominance",
        "ETH Dominance",
        "Active Assets"
    ]);
    table.add_row(row![
        format_usd(stats.total_market_cap),
        format_usd(stats.total_volume_24h),
        format!("{:.2}%", stats.btc_dominance),
        format!("{:.2}%", stats.eth_dominance),
        stats.active_assets
    ]);
    table.to_string()
}

pub fn asset_table(assets: &[AssetResponse]) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["#", "Name", "Symbol", "Price", "24h", "Market Cap", "Volume"]);

    for asset in assets {
        table.add_row(row![
            asset
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            asset.name,
            asset.symbol.to_uppercase(),
            format_price(asset.price),
            format_change(asset.change_24h),
            format_usd(asset.market_cap),
            format_usd(asset.volume_24h)
        ]);
    }

    table.to_string()
}

/// Compact dollar amount: $1.23T, $45.60B, $7.80M, $950.00
pub fn format_usd(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };
    if abs >= 1e12 {
        format!("{}${:.2}T", sign, abs / 1e12)
    } else if abs >= 1e9 {
        format!("{}${:.2}B", sign, abs / 1e9)
    } else if abs >= 1e6 {
        format!("{}${:.2}M", sign, abs / 1e6)
    } else {
        format!("{}${:.2}", sign, abs)
    }
}

/// Sub-dollar prices keep more precision
pub fn format_price(value: f64) -> String {
    if value >= 1.0 {
        format!("${:.2}", value)
    } else {
        format!("${:.6}", value)
    }
}

/// `change` is a fraction; 0.025 renders as +2.50%
pub fn format_change(change: f64) -> String {
    format!("{:+.2}%", change * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::state::DashboardData;
    use crate::error::DashboardError;
    use chrono::Utc;

    fn asset(id: &str, rank: Option<i32>, price: f64, change: f64, cap: f64) -> AssetResponse {
        AssetResponse {
            id: id.to_string(),
            symbol: id[..3].to_string(),
            name: id.to_string(),
            image_url: None,
            market_cap_rank: rank,
            price,
            change_24h: change,
            market_cap: cap,
            volume_24h: cap / 10.0,
            high_24h: price,
            low_24h: price,
            circulating_supply: 0.0,
            total_supply: 0.0,
            max_supply: None,
            ath: price,
            atl: price,
            quality_score: 100.0,
            last_updated: Utc::now(),
        }
    }

    fn stats() -> MarketStatsResponse {
        MarketStatsResponse {
            total_market_cap: 2.5e12,
            total_volume_24h: 9.1e10,
            active_assets: 250,
            btc_dominance: 52.31,
            eth_dominance: 17.04,
            top_gainers: vec![],
            top_losers: vec![],
            last_updated: None,
        }
    }

    #[test]
    fn test_formatters() {
        assert_eq!(format_usd(2.5e12), "$2.50T");
        assert_eq!(format_usd(4.56e10), "$45.60B");
        assert_eq!(format_usd(7.8e6), "$7.80M");
        assert_eq!(format_usd(950.0), "$950.00");
        assert_eq!(format_price(0.000123), "$0.000123");
        assert_eq!(format_change(0.025), "+2.50%");
        assert_eq!(format_change(-0.1), "-10.00%");
    }

    #[test]
    fn test_sort_by_rank_puts_unranked_last() {
        let mut assets = vec![
            asset("solana", None, 150.0, 0.0, 1e9),
            asset("ethereum", Some(2), 3000.0, 0.0, 4e11),
            asset("bitcoin", Some(1), 64000.0, 0.0, 1.2e12),
        ];

        sort_assets(&mut assets, TableSort::default());

        let ids: Vec<_> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum", "solana"]);
    }

    #[test]
    fn test_sort_by_change_descending() {
        let mut assets = vec![
            asset("bitcoin", Some(1), 64000.0, 0.01, 1.2e12),
            asset("ethereum", Some(2), 3000.0, -0.03, 4e11),
            asset("solana", Some(5), 150.0, 0.08, 7e10),
        ];

        let sort = TableSort::default().select(SortKey::Change);
        assert!(sort.descending);
        sort_assets(&mut assets, sort);

        let ids: Vec<_> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["solana", "bitcoin", "ethereum"]);

        let flipped = sort.select(SortKey::Change);
        assert!(!flipped.descending);
    }

    #[test]
    fn test_render_loading() {
        let output = render(&DashboardState::new(), TableSort::default());
        assert!(output.contains("Loading market data"));
    }

    #[test]
    fn test_render_error_panel() {
        let mut state = DashboardState::new();
        let generation = state.begin_fetch();
        state.complete(
            generation,
            Err(DashboardError::Network("connection refused".to_string())),
        );

        let output = render(&state, TableSort::default());
        assert!(output.contains("Failed to load market data"));
        assert!(output.contains("connection refused"));
        assert!(output.contains("retry"));
    }

    #[test]
    fn test_render_ready() {
        let mut state = DashboardState::new();
        let generation = state.begin_fetch();
        state.complete(
            generation,
            Ok(DashboardData {
                assets: vec![asset("bitcoin", Some(1), 64000.0, 0.025, 1.2e12)],
                stats: stats(),
            }),
        );

        let output = render(&state, TableSort::default());
        assert!(output.contains("Total Market Cap"));
        assert!(output.contains("$2.50T"));
        assert!(output.contains("52.31%"));
        assert!(output.contains("BTC"));
        assert!(output.contains("+2.50%"));
        assert!(!output.contains("Loading"));
    }
}
