use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::services::feed::{GlobalData, GlobalResponse, MarketFeed, RawAsset};

const MARKETS_ENDPOINT: &str = "/coins/markets";
const GLOBAL_ENDPOINT: &str = "/global";

#[derive(Clone)]
pub struct CoinGeckoService {
    client: Client,
    api_key: Option<String>,
    api_key_header: String,
    base_url: String,
}

impl CoinGeckoService {
    pub fn new(config: &FeedConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(query);

        if let Some(key) = &self.api_key {
            request = request.header(self.api_key_header.as_str(), key);
        }

        let response = request.send().await.map_err(|source| FeedError::Network {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        let body = response.text().await.map_err(|source| FeedError::Network {
            endpoint: endpoint.to_string(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| FeedError::Malformed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketFeed for CoinGeckoService {
    async fn fetch_markets(&self, page: u32, per_page: u32) -> Result<Vec<RawAsset>, FeedError> {
        tracing::debug!(page, per_page, "Fetching markets page from CoinGecko");

        let page_items: Vec<Value> = self
            .get_json(
                MARKETS_ENDPOINT,
                &[
                    ("vs_currency", "usd".to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                    ("sparkline", "false".to_string()),
                ],
            )
            .await?;

        let assets = decode_markets_page(page, page_items);
        tracing::debug!(page, count = assets.len(), "Fetched markets page");

        Ok(assets)
    }

    async fn fetch_global(&self) -> Result<GlobalData, FeedError> {
        tracing::debug!("Fetching global market data from CoinGecko");

        let global: GlobalResponse = self.get_json(GLOBAL_ENDPOINT, &[]).await?;

        Ok(global.data)
    }
}

/// Elements that are not objects become empty records so the normalizer
/// rejects and counts them without failing the page.
fn decode_markets_page(page: u32, items: Vec<Value>) -> Vec<RawAsset> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<RawAsset>(item).unwrap_or_else(|e| {
                tracing::warn!(page, index, error = %e, "Undecodable asset record in markets page");
                RawAsset::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::{Json, Router, extract::Query, http::HeaderMap, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::config::DEFAULT_API_KEY_HEADER as DEFAULT_HEADER;
    use crate::services::normalizer::normalize_all;

    /// Serve `router` on an ephemeral port and return its base url
    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn service(base_url: String, api_key: Option<&str>, header: &str) -> CoinGeckoService {
        CoinGeckoService::new(&FeedConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            api_key_header: header.to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn bitcoin() -> Value {
        json!({"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 64000})
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limited() {
        let base = serve(Router::new().route(
            "/coins/markets",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        ))
        .await;

        let err = service(base, None, DEFAULT_HEADER)
            .fetch_markets(1, 10)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::RateLimited { ref endpoint } if endpoint == "/coins/markets"));
    }

    #[tokio::test]
    async fn test_other_error_status_keeps_body() {
        let base = serve(Router::new().route(
            "/global",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        ))
        .await;

        let err = service(base, None, DEFAULT_HEADER)
            .fetch_global()
            .await
            .unwrap_err();

        match err {
            FeedError::Status { status, body, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let base = serve(Router::new().route(
            "/coins/markets",
            get(|| async { "<html>bad gateway</html>" }),
        ))
        .await;

        let err = service(base, None, DEFAULT_HEADER)
            .fetch_markets(1, 10)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_api_key_sent_in_configured_header() {
        let base = serve(Router::new().route(
            "/coins/markets",
            get(|headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                let key = headers.get("x-cg-demo-api-key").and_then(|v| v.to_str().ok());
                let params_ok = params.get("vs_currency").map(String::as_str) == Some("usd")
                    && params.get("order").map(String::as_str) == Some("market_cap_desc")
                    && params.get("page").map(String::as_str) == Some("2")
                    && params.get("per_page").map(String::as_str) == Some("50");

                if key == Some("secret") && params_ok {
                    (StatusCode::OK, Json(json!([bitcoin()])))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad request"})))
                }
            }),
        ))
        .await;

        let assets = service(base, Some("secret"), "x-cg-demo-api-key")
            .fetch_markets(2, 50)
            .await
            .unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, Some(json!("bitcoin")));
    }

    #[tokio::test]
    async fn test_no_key_header_without_api_key() {
        let base = serve(Router::new().route(
            "/global",
            get(|headers: HeaderMap| async move {
                if headers.contains_key(DEFAULT_HEADER) {
                    (StatusCode::BAD_REQUEST, Json(json!({"error": "unexpected key"})))
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({"data": {"active_cryptocurrencies": 42}})),
                    )
                }
            }),
        ))
        .await;

        let global = service(base, None, DEFAULT_HEADER)
            .fetch_global()
            .await
            .unwrap();

        assert_eq!(global.active_cryptocurrencies, Some(42));
    }

    #[tokio::test]
    async fn test_non_object_elements_do_not_fail_page() {
        let base = serve(Router::new().route(
            "/coins/markets",
            get(|| async {
                Json(json!([
                    bitcoin(),
                    null,
                    "junk",
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": "3000.5"}
                ]))
            }),
        ))
        .await;

        let raws = service(base, None, DEFAULT_HEADER)
            .fetch_markets(1, 10)
            .await
            .unwrap();
        assert_eq!(raws.len(), 4);

        let outcome = normalize_all(&raws, chrono::Utc::now());
        assert_eq!(outcome.assets.len(), 2);
        assert_eq!(outcome.rejected, 2);
        assert_eq!(outcome.assets[1].id, "ethereum");
    }

    #[test]
    fn test_decode_markets_page_keeps_valid_records() {
        let items = vec![bitcoin(), Value::Null, json!(7)];
        let raws = decode_markets_page(1, items);

        assert_eq!(raws.len(), 3);
        assert_eq!(raws[0].symbol, Some(json!("btc")));
        assert!(raws[1].id.is_none());
        assert!(raws[2].id.is_none());
    }

    #[test]
    fn test_new_keeps_feed_settings() {
        let config = FeedConfig {
            base_url: "http://feed.local/api/v3".to_string(),
            api_key: None,
            api_key_header: "x-cg-demo-api-key".to_string(),
            request_timeout: Duration::from_secs(5),
        };

        let service = CoinGeckoService::new(&config).unwrap();
        assert_eq!(service.base_url(), "http://feed.local/api/v3");
        assert!(service.api_key.is_none());
        assert_eq!(service.api_key_header, "x-cg-demo-api-key");
    }

    #[test]
    fn test_raw_asset_tolerates_nulls_and_missing_fields() {
        let payload = r#"[{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":64000.5,"max_supply":null}]"#;
        let assets: Vec<RawAsset> = serde_json::from_str(payload).unwrap();

        assert_eq!(assets.len(), 1);
        assert!(assets[0].max_supply.is_none());
        assert!(assets[0].total_volume.is_none());
    }

    #[test]
    fn test_global_payload_decodes() {
        let payload = r#"{"data":{"active_cryptocurrencies":12000,"total_market_cap":{"usd":2.5e12},"market_cap_percentage":{"btc":52.1,"eth":17.3},"updated_at":1760000000}}"#;
        let global: GlobalResponse = serde_json::from_str(payload).unwrap();

        assert_eq!(global.data.active_cryptocurrencies, Some(12000));
        assert_eq!(global.data.market_cap_percentage.get("btc"), Some(&52.1));
        assert!(global.data.total_volume.is_empty());
    }
}
