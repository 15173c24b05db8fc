pub mod assets;
pub mod health;
pub mod live;
pub mod market;

use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use sea_orm::DbErr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::AppState;
use crate::error::FeedError;
use crate::models::common::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";
pub const CURRENT_PAGE_HEADER: &str = "x-current-page";
pub const PER_PAGE_HEADER: &str = "x-per-page";

/// `Cache-Control: max-age` per endpoint family, in seconds
pub mod cache_ttl {
    pub const LIST: u32 = 60;
    pub const DETAIL: u32 = 30;
    pub const HISTORY: u32 = 3600;
    pub const STATS: u32 = 300;
    pub const LIVE: u32 = 30;
}

/// Correlation id attached to every request by [`request_id`]
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.server.cors_origins);

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/assets", get(assets::list_assets))
        .route("/api/assets/{id_or_symbol}", get(assets::get_asset))
        .route("/api/assets/{id_or_symbol}/history", get(assets::get_asset_history))
        .route("/api/market/stats", get(market::get_market_stats))
        .route("/api/market/snapshots", get(market::get_market_snapshots))
        .route("/api/live/markets", get(live::get_live_markets))
        .route("/api/live/global", get(live::get_live_global))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(request_id))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let exposed = [
        HeaderName::from_static(REQUEST_ID_HEADER),
        HeaderName::from_static(TOTAL_COUNT_HEADER),
        HeaderName::from_static(TOTAL_PAGES_HEADER),
        HeaderName::from_static(CURRENT_PAGE_HEADER),
        HeaderName::from_static(PER_PAGE_HEADER),
    ];

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers(exposed);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Reuse the caller's `X-Request-ID` or mint a uuid, and echo it back
async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

pub(crate) fn cache_headers(max_age: u32) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers
}

pub(crate) fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub(crate) fn not_found(message: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

pub(crate) fn db_error(e: DbErr) -> ApiError {
    tracing::error!(error = %e, "Database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Database error")),
    )
}

/// Upstream details stay in the logs; clients get a fixed message
pub(crate) fn upstream_error(e: FeedError) -> ApiError {
    tracing::error!(error = %e, "Upstream price feed request failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse::new("Upstream price feed unavailable")),
    )
}
