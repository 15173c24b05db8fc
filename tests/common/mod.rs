//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::env;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crypto_dashboard::config::IngestConfig;
use crypto_dashboard::error::FeedError;
use crypto_dashboard::services::aggregate::{AssetFigures, MarketAggregate};
use crypto_dashboard::services::feed::{GlobalData, MarketFeed, RawAsset};
use crypto_dashboard::services::market_store::MarketStore;
use crypto_dashboard::services::normalizer::NormalizedAsset;
use sea_orm::{Database, DatabaseConnection, DbErr};

/// Connect to the Postgres test database
/// Uses TEST_DATABASE_URL environment variable or falls back to default
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| {
        "postgresql://dashboard_user@localhost:5432/crypto_dashboard_test".to_string()
    });

    Database::connect(&database_url).await
}

/// Settings with millisecond delays so retries do not slow the suite down
pub fn fast_settings() -> IngestConfig {
    IngestConfig {
        update_interval: Duration::ZERO,
        pages: 1,
        per_page: 250,
        batch_size: 100,
        max_retries: 5,
        retry_base_delay: Duration::from_millis(1),
        batch_max_retries: 3,
        batch_retry_delay: Duration::from_millis(1),
        rate_limit_delay: Duration::ZERO,
    }
}

pub fn raw_asset(id: &str, symbol: &str, price: f64, market_cap: f64) -> RawAsset {
    RawAsset {
        id: Some(json!(id)),
        symbol: Some(json!(symbol)),
        name: Some(json!(id)),
        image: Some(json!(format!("https://img.example/{}.png", id))),
        current_price: Some(json!(price)),
        market_cap: Some(json!(market_cap)),
        market_cap_rank: Some(json!(1)),
        total_volume: Some(json!(market_cap / 10.0)),
        high_24h: Some(json!(price)),
        low_24h: Some(json!(price)),
        price_change_percentage_24h: Some(json!(2.5)),
        circulating_supply: Some(json!(1000)),
        total_supply: Some(json!(1000)),
        max_supply: None,
        ath: Some(json!(price)),
        ath_change_percentage: Some(json!(0)),
        atl: Some(json!(price)),
        atl_change_percentage: Some(json!(0)),
        last_updated: Some(json!("2026-10-01T12:00:00Z")),
    }
}

pub fn with_last_updated(mut raw: RawAsset, ts: &str) -> RawAsset {
    raw.last_updated = Some(Value::String(ts.to_string()));
    raw
}

pub fn global_data() -> GlobalData {
    let mut global = GlobalData {
        active_cryptocurrencies: Some(12_000),
        markets: Some(900),
        market_cap_change_percentage_24h_usd: Some(1.5),
        updated_at: Some(1_790_000_000),
        ..Default::default()
    };
    global.total_market_cap.insert("usd".to_string(), 2.4e12);
    global.total_volume.insert("usd".to_string(), 8.0e10);
    global.market_cap_percentage.insert("btc".to_string(), 55.0);
    global.market_cap_percentage.insert("eth".to_string(), 12.0);
    global
}

/// Feed that replays scripted `/coins/markets` responses in order and then
/// keeps returning `fallback`.
pub struct FakeFeed {
    scripted: Mutex<VecDeque<Result<Vec<RawAsset>, FeedError>>>,
    fallback: Vec<RawAsset>,
    global: Mutex<Option<GlobalData>>,
    market_calls: AtomicUsize,
    global_calls: AtomicUsize,
}

impl FakeFeed {
    pub fn new(fallback: Vec<RawAsset>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback,
            global: Mutex::new(Some(global_data())),
            market_calls: AtomicUsize::new(0),
            global_calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, response: Result<Vec<RawAsset>, FeedError>) -> Self {
        self.scripted.lock().unwrap().push_back(response);
        self
    }

    /// Make every `/global` call fail
    pub fn without_global(self) -> Self {
        *self.global.lock().unwrap() = None;
        self
    }

    pub fn market_calls(&self) -> usize {
        self.market_calls.load(Ordering::SeqCst)
    }

    pub fn global_calls(&self) -> usize {
        self.global_calls.load(Ordering::SeqCst)
    }
}

pub fn rate_limited() -> FeedError {
    FeedError::RateLimited {
        endpoint: "/coins/markets".to_string(),
    }
}

#[async_trait]
impl MarketFeed for FakeFeed {
    async fn fetch_markets(&self, _page: u32, _per_page: u32) -> Result<Vec<RawAsset>, FeedError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        match self.scripted.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(self.fallback.clone()),
        }
    }

    async fn fetch_global(&self) -> Result<GlobalData, FeedError> {
        self.global_calls.fetch_add(1, Ordering::SeqCst);
        self.global.lock().unwrap().clone().ok_or_else(|| FeedError::Status {
            endpoint: "/global".to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "maintenance".to_string(),
        })
    }
}

/// Store with the same conflict rules as the Postgres one: history is keyed
/// by (asset, last_updated) and the snapshot keeps the newest observation.
/// `postgres_store_tests.rs` checks those rules against the real schema.
#[derive(Default)]
pub struct InMemoryStore {
    pub assets: Mutex<HashMap<String, String>>,
    pub history: Mutex<HashSet<(String, DateTime<Utc>)>>,
    pub snapshot: Mutex<HashMap<String, NormalizedAsset>>,
    pub stats: Mutex<Vec<MarketAggregate>>,
    failures_left: AtomicUsize,
    pub upsert_calls: AtomicUsize,
}

impl InMemoryStore {
    /// Fail the next `count` batch writes
    pub fn failing(count: usize) -> Self {
        let store = Self::default();
        store.failures_left.store(count, Ordering::SeqCst);
        store
    }

    pub fn snapshot_row(&self, id: &str) -> Option<NormalizedAsset> {
        self.snapshot.lock().unwrap().get(id).cloned()
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.lock().unwrap().len()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn upsert_batch(&self, batch: &[NormalizedAsset]) -> Result<(), DbErr> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DbErr::Custom("connection reset".to_string()));
        }

        let mut assets = self.assets.lock().unwrap();
        let mut history = self.history.lock().unwrap();
        let mut snapshot = self.snapshot.lock().unwrap();

        for asset in batch {
            assets.insert(asset.id.clone(), asset.symbol.clone());
            history.insert((asset.id.clone(), asset.last_updated));

            let replace = snapshot
                .get(&asset.id)
                .is_none_or(|current| current.last_updated <= asset.last_updated);
            if replace {
                snapshot.insert(asset.id.clone(), asset.clone());
            }
        }

        Ok(())
    }

    async fn latest_snapshot(&self) -> Result<Vec<AssetFigures>, DbErr> {
        Ok(self
            .snapshot
            .lock()
            .unwrap()
            .values()
            .map(|a| AssetFigures {
                asset_id: a.id.clone(),
                symbol: a.symbol.clone(),
                market_cap: a.market_cap,
                volume_24h: a.volume_24h,
            })
            .collect())
    }

    async fn insert_market_stats(&self, aggregate: &MarketAggregate) -> Result<(), DbErr> {
        self.stats.lock().unwrap().push(aggregate.clone());
        Ok(())
    }
}
