pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_assets;
mod m20261001_000002_create_price_history;
mod m20261001_000003_create_latest_prices;
mod m20261001_000004_create_market_stats;
mod m20261001_000005_create_sync_status;
mod m20261001_000006_create_market_functions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_assets::Migration),
            Box::new(m20261001_000002_create_price_history::Migration),
            Box::new(m20261001_000003_create_latest_prices::Migration),
            Box::new(m20261001_000004_create_market_stats::Migration),
            Box::new(m20261001_000005_create_sync_status::Migration),
            Box::new(m20261001_000006_create_market_functions::Migration),
        ]
    }
}
