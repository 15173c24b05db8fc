use std::sync::Arc;

use anyhow::Context;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tokio::net::TcpListener;

use crypto_dashboard::{
    AppState,
    config::Config,
    handlers::app_router,
    jobs::market_data_sync::{IngestionJob, start_market_data_sync_job},
    services::{coingecko::CoinGeckoService, feed::MarketFeed, market_store::PgMarketStore},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    telemetry::init_tracing(telemetry::DEFAULT_FILTER);

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running migrations...");
    Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    let feed: Arc<dyn MarketFeed> =
        Arc::new(CoinGeckoService::new(&config.feed).context("Failed to build feed client")?);

    if config.server.run_ingestion {
        let store = Arc::new(PgMarketStore::new(db.clone()));
        let job = Arc::new(IngestionJob::new(feed.clone(), store, config.ingest.clone()));
        start_market_data_sync_job(db.clone(), job).await;
    }

    let state = AppState {
        db,
        feed,
        server: Arc::new(config.server.clone()),
    };

    let app = app_router(state);

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    tracing::info!(
        environment = %config.server.environment,
        "Server listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
