//! Pass-through endpoints that hit the price feed directly, bypassing the
//! database. Records are normalized the same way the ingestion job does it.

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;

use super::{ApiError, bad_request, cache_headers, cache_ttl, upstream_error};
use crate::{
    AppState,
    models::{
        asset::AssetResponse,
        market::{GlobalMarketResponse, LiveMarketsQuery},
    },
    services::normalizer::normalize_all,
};

/// Handler for GET /api/live/markets
pub async fn get_live_markets(
    State(state): State<AppState>,
    Query(query): Query<LiveMarketsQuery>,
) -> Result<(HeaderMap, Json<Vec<AssetResponse>>), ApiError> {
    query.validate().map_err(bad_request)?;

    let raws = state
        .feed
        .fetch_markets(query.page(), query.per_page())
        .await
        .map_err(upstream_error)?;

    let outcome = normalize_all(&raws, Utc::now());
    if outcome.rejected > 0 {
        tracing::debug!(rejected = outcome.rejected, "Dropped invalid live records");
    }

    Ok((
        cache_headers(cache_ttl::LIVE),
        Json(outcome.assets.into_iter().map(AssetResponse::from).collect()),
    ))
}

/// Handler for GET /api/live/global
pub async fn get_live_global(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<GlobalMarketResponse>), ApiError> {
    let global = state.feed.fetch_global().await.map_err(upstream_error)?;

    Ok((cache_headers(cache_ttl::LIVE), Json(global.into())))
}
