use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    DbBackend, DbErr, EntityTrait, FromQueryResult, QueryOrder, QuerySelect, Statement,
    prelude::DateTimeWithTimeZone,
};

use super::{ApiError, bad_request, cache_headers, cache_ttl, db_error};
use crate::{
    AppState,
    entities::{market_stats, prelude::*},
    models::{
        decimal_to_f64,
        market::{
            MarketSnapshotResponse, MarketStatsResponse, MoverResponse, SnapshotQuery,
            TOP_MOVERS_LIMIT,
        },
    },
};

#[derive(Debug, FromQueryResult)]
struct StatsRow {
    total_market_cap: Decimal,
    total_volume_24h: Decimal,
    active_assets: i64,
    btc_dominance: Decimal,
    eth_dominance: Decimal,
    last_updated: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, FromQueryResult)]
struct MoverRow {
    asset_id: String,
    symbol: String,
    name: String,
    price: Decimal,
    change_24h: Decimal,
}

impl From<MoverRow> for MoverResponse {
    fn from(row: MoverRow) -> Self {
        Self {
            id: row.asset_id,
            symbol: row.symbol,
            name: row.name,
            price: decimal_to_f64(row.price),
            change_24h: decimal_to_f64(row.change_24h),
        }
    }
}

/// Handler for GET /api/market/stats
/// Totals and dominance from get_market_stats() plus the top movers
pub async fn get_market_stats(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<MarketStatsResponse>), ApiError> {
    let stats = StatsRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        "SELECT total_market_cap, total_volume_24h, active_assets, btc_dominance, eth_dominance, last_updated FROM get_market_stats()",
    ))
    .one(&state.db)
    .await
    .map_err(db_error)?;

    let top_gainers = movers(&state, "get_top_gainers").await.map_err(db_error)?;
    let top_losers = movers(&state, "get_top_losers").await.map_err(db_error)?;

    let response = match stats {
        Some(row) => MarketStatsResponse {
            total_market_cap: decimal_to_f64(row.total_market_cap),
            total_volume_24h: decimal_to_f64(row.total_volume_24h),
            active_assets: row.active_assets,
            btc_dominance: decimal_to_f64(row.btc_dominance),
            eth_dominance: decimal_to_f64(row.eth_dominance),
            top_gainers,
            top_losers,
            last_updated: row.last_updated.map(|ts| ts.with_timezone(&Utc)),
        },
        None => MarketStatsResponse {
            total_market_cap: 0.0,
            total_volume_24h: 0.0,
            active_assets: 0,
            btc_dominance: 0.0,
            eth_dominance: 0.0,
            top_gainers,
            top_losers,
            last_updated: None,
        },
    };

    Ok((cache_headers(cache_ttl::STATS), Json(response)))
}

async fn movers(state: &AppState, function: &'static str) -> Result<Vec<MoverResponse>, DbErr> {
    let rows = MoverRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        format!(
            "SELECT asset_id, symbol, name, price, change_24h FROM {}($1)",
            function
        ),
        [TOP_MOVERS_LIMIT.into()],
    ))
    .all(&state.db)
    .await?;

    Ok(rows.into_iter().map(MoverResponse::from).collect())
}

/// Handler for GET /api/market/snapshots
/// Most recent persisted aggregates, newest first
pub async fn get_market_snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<(HeaderMap, Json<Vec<MarketSnapshotResponse>>), ApiError> {
    query.validate().map_err(bad_request)?;

    let rows = MarketStats::find()
        .order_by_desc(market_stats::Column::RecordedAt)
        .limit(query.limit())
        .all(&state.db)
        .await
        .map_err(db_error)?;

    Ok((
        cache_headers(cache_ttl::STATS),
        Json(rows.into_iter().map(MarketSnapshotResponse::from).collect()),
    ))
}
