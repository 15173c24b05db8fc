use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when the database answers, "degraded" otherwise
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
