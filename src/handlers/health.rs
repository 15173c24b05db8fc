use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;

use super::RequestId;
use crate::AppState;
use crate::models::health::HealthResponse;

/// Handler for GET /api/health
///
/// Answers 503 with the same body when the database does not respond to a ping.
pub async fn health_check(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database ping failed");
            false
        }
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.server.environment.clone(),
        database: if database_ok { "ok" } else { "unavailable" }.to_string(),
        request_id: request_id.map(|Extension(RequestId(id))| id),
        timestamp: Utc::now(),
    };

    (status, Json(response))
}
