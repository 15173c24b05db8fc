use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::models::asset::{AssetResponse, MAX_PAGE_SIZE};
use crate::models::common::ErrorResponse;
use crate::models::market::MarketStatsResponse;

/// The two reads the dashboard needs from the API layer
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_assets(&self) -> Result<Vec<AssetResponse>, DashboardError>;

    async fn fetch_market_stats(&self) -> Result<MarketStatsResponse, DashboardError>;
}

#[derive(Clone)]
pub struct HttpDashboardApi {
    client: Client,
    base_url: String,
    rows: usize,
}

impl HttpDashboardApi {
    pub fn new(config: &DashboardConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            rows: config.rows.clamp(1, MAX_PAGE_SIZE as usize),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DashboardError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| DashboardError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DashboardError::Network(e.to_string()))?;

        if !status.is_success() {
            // Prefer the API's own `{"error": ..}` message
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(DashboardError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| DashboardError::Network(format!(
            "unexpected response from {}: {}",
            path, e
        )))
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn fetch_assets(&self) -> Result<Vec<AssetResponse>, DashboardError> {
        self.get_json(
            "/api/assets",
            &[
                ("per_page", self.rows.to_string()),
                ("sort_by", "market_cap".to_string()),
                ("order", "desc".to_string()),
            ],
        )
        .await
    }

    async fn fetch_market_stats(&self) -> Result<MarketStatsResponse, DashboardError> {
        self.get_json("/api/market/stats", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_api_is_network_error() {
        let config = DashboardConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            refresh_interval: Duration::from_secs(60),
            rows: 10,
            request_timeout: Duration::from_secs(2),
        };
        let api = HttpDashboardApi::new(&config).unwrap();

        let err = api.fetch_market_stats().await.unwrap_err();
        assert!(matches!(err, DashboardError::Network(_)));
    }

    #[test]
    fn test_rows_clamped_to_page_limit() {
        let config = DashboardConfig {
            api_url: "http://localhost:3000".to_string(),
            refresh_interval: Duration::from_secs(60),
            rows: 10_000,
            request_timeout: Duration::from_secs(2),
        };
        let api = HttpDashboardApi::new(&config).unwrap();
        assert_eq!(api.rows, 250);
    }
}
