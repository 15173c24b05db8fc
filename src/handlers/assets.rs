use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbBackend, DbErr, EntityTrait, FromQueryResult,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    prelude::DateTimeWithTimeZone,
};

use super::{
    ApiError, CURRENT_PAGE_HEADER, PER_PAGE_HEADER, TOTAL_COUNT_HEADER, TOTAL_PAGES_HEADER,
    bad_request, cache_headers, cache_ttl, db_error, not_found,
};
use crate::{
    AppState,
    entities::{latest_prices, prelude::*},
    models::{
        asset::{
            AssetListQuery, AssetResponse, HistoryPoint, HistoryQuery, HistoryResponse,
            SortField, SortOrder,
        },
        decimal_to_f64,
    },
};

#[derive(Debug, FromQueryResult)]
struct HistoryRow {
    observed_at: DateTimeWithTimeZone,
    price: Decimal,
    market_cap: Decimal,
    volume_24h: Decimal,
}

/// Handler for GET /api/assets
/// Paginated, sortable, searchable view of the latest snapshot
pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<AssetListQuery>,
) -> Result<(HeaderMap, Json<Vec<AssetResponse>>), ApiError> {
    query.validate().map_err(bad_request)?;

    let page = query.page();
    let per_page = query.per_page();

    let mut select = LatestPrices::find();
    if let Some(term) = query.search_term() {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        select = select.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(latest_prices::Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(latest_prices::Column::Symbol))).like(pattern)),
        );
    }

    let total = select.clone().count(&state.db).await.map_err(db_error)?;

    let column = match query.sort_field() {
        SortField::MarketCap => latest_prices::Column::MarketCap,
        SortField::Volume24h => latest_prices::Column::Volume24h,
        SortField::Price => latest_prices::Column::Price,
        SortField::Change24h => latest_prices::Column::Change24h,
        SortField::Name => latest_prices::Column::Name,
        SortField::Symbol => latest_prices::Column::Symbol,
    };
    let order = match query.sort_order() {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    };

    let rows = select
        .order_by(column, order)
        .order_by_asc(latest_prices::Column::AssetId)
        .offset(query.offset())
        .limit(per_page)
        .all(&state.db)
        .await
        .map_err(db_error)?;

    tracing::debug!(page, per_page, total, returned = rows.len(), "Listed assets");

    let total_pages = total.div_ceil(per_page);
    let mut headers = cache_headers(cache_ttl::LIST);
    for (name, value) in [
        (TOTAL_COUNT_HEADER, total),
        (TOTAL_PAGES_HEADER, total_pages),
        (CURRENT_PAGE_HEADER, page),
        (PER_PAGE_HEADER, per_page),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }

    Ok((headers, Json(rows.into_iter().map(AssetResponse::from).collect())))
}

/// Handler for GET /api/assets/{id_or_symbol}
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id_or_symbol): Path<String>,
) -> Result<(HeaderMap, Json<AssetResponse>), ApiError> {
    let row = find_asset(&state.db, &id_or_symbol)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("Asset '{}' not found", id_or_symbol)))?;

    Ok((cache_headers(cache_ttl::DETAIL), Json(row.into())))
}

/// Handler for GET /api/assets/{id_or_symbol}/history
pub async fn get_asset_history(
    State(state): State<AppState>,
    Path(id_or_symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<(HeaderMap, Json<HistoryResponse>), ApiError> {
    query.validate().map_err(bad_request)?;
    let days = query.days();

    let asset = find_asset(&state.db, &id_or_symbol)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("Asset '{}' not found", id_or_symbol)))?;

    let rows = HistoryRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT observed_at, price, market_cap, volume_24h FROM get_crypto_history($1, $2)",
        [asset.asset_id.clone().into(), (days as i32).into()],
    ))
    .all(&state.db)
    .await
    .map_err(db_error)?;

    let points = rows
        .into_iter()
        .map(|row| HistoryPoint {
            timestamp: row.observed_at.with_timezone(&Utc),
            price: decimal_to_f64(row.price),
            market_cap: decimal_to_f64(row.market_cap),
            volume_24h: decimal_to_f64(row.volume_24h),
        })
        .collect();

    Ok((
        cache_headers(cache_ttl::HISTORY),
        Json(HistoryResponse {
            id: asset.asset_id,
            symbol: asset.symbol,
            days,
            points,
        }),
    ))
}

/// Exact id first, then symbol. Symbols are stored lowercase and are not
/// unique, so the largest market cap wins.
async fn find_asset<C>(db: &C, id_or_symbol: &str) -> Result<Option<latest_prices::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let key = id_or_symbol.trim().to_lowercase();
    if key.is_empty() {
        return Ok(None);
    }

    if let Some(row) = LatestPrices::find_by_id(key.clone()).one(db).await? {
        return Ok(Some(row));
    }

    LatestPrices::find()
        .filter(latest_prices::Column::Symbol.eq(key))
        .order_by_desc(latest_prices::Column::MarketCap)
        .one(db)
        .await
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("usd_t"), "usd\\_t");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("btc"), "btc");
    }
}
