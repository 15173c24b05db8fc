//! Standalone ingestion runner.
//!
//! Runs the market data sync on its own schedule, or once when
//! `UPDATE_INTERVAL_SECS=0`; a failed single run exits non-zero.

use std::sync::Arc;

use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

use crypto_dashboard::{
    config::Config,
    jobs::market_data_sync::{IngestionJob, run_scheduled, run_tracked},
    services::{coingecko::CoinGeckoService, market_store::PgMarketStore},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing(telemetry::DEFAULT_FILTER);

    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    let feed = Arc::new(CoinGeckoService::new(&config.feed).context("Failed to build feed client")?);
    tracing::info!(base_url = feed.base_url(), "Using price feed");

    let store = Arc::new(PgMarketStore::new(db.clone()));
    let job = Arc::new(IngestionJob::new(feed, store, config.ingest.clone()));

    if config.ingest.is_one_shot() {
        let report = run_tracked(&db, &job).await?;
        println!(
            "Stored {} of {} assets ({} rejected, {} duplicates) in {} batches",
            report.stored, report.fetched, report.rejected, report.duplicates, report.batches
        );
    } else {
        run_scheduled(db, job).await;
    }

    Ok(())
}
