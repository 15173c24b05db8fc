// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use config::ServerConfig;
use services::feed::MarketFeed;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub feed: Arc<dyn MarketFeed>,
    pub server: Arc<ServerConfig>,
}

pub mod entities {
    pub mod prelude;
    pub mod assets;
    pub mod latest_prices;
    pub mod market_stats;
    pub mod price_history;
    pub mod sync_status;
}

pub mod services {
    pub mod aggregate;
    pub mod coingecko;
    pub mod feed;
    pub mod market_store;
    pub mod normalizer;
    pub mod sync_status;
}

pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod telemetry;
