use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // Aggregate over the current snapshot, computed at read time
        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION get_market_stats()
            RETURNS TABLE (
                total_market_cap NUMERIC,
                total_volume_24h NUMERIC,
                active_assets BIGINT,
                btc_dominance NUMERIC,
                eth_dominance NUMERIC,
                last_updated TIMESTAMPTZ
            )
            LANGUAGE sql STABLE AS $$
                WITH totals AS (
                    SELECT
                        COALESCE(SUM(market_cap), 0) AS cap,
                        COALESCE(SUM(volume_24h), 0) AS volume,
                        COUNT(*) FILTER (WHERE market_cap > 0) AS active,
                        COALESCE(SUM(market_cap) FILTER (WHERE asset_id = 'bitcoin'), 0) AS btc_cap,
                        COALESCE(SUM(market_cap) FILTER (WHERE asset_id = 'ethereum'), 0) AS eth_cap,
                        MAX(last_updated) AS last_updated
                    FROM latest_prices
                )
                SELECT
                    cap,
                    volume,
                    active,
                    CASE WHEN cap > 0 THEN ROUND(btc_cap / cap * 100, 2) ELSE 0 END,
                    CASE WHEN cap > 0 THEN ROUND(eth_cap / cap * 100, 2) ELSE 0 END,
                    last_updated
                FROM totals;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION get_top_gainers(limit_param INTEGER DEFAULT 5)
            RETURNS TABLE (
                asset_id TEXT,
                symbol TEXT,
                name TEXT,
                price NUMERIC,
                change_24h NUMERIC
            )
            LANGUAGE sql STABLE AS $$
                SELECT lp.asset_id::text, lp.symbol::text, lp.name::text, lp.price, lp.change_24h
                FROM latest_prices lp
                WHERE lp.market_cap > 0
                ORDER BY lp.change_24h DESC, lp.asset_id
                LIMIT limit_param;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION get_top_losers(limit_param INTEGER DEFAULT 5)
            RETURNS TABLE (
                asset_id TEXT,
                symbol TEXT,
                name TEXT,
                price NUMERIC,
                change_24h NUMERIC
            )
            LANGUAGE sql STABLE AS $$
                SELECT lp.asset_id::text, lp.symbol::text, lp.name::text, lp.price, lp.change_24h
                FROM latest_prices lp
                WHERE lp.market_cap > 0
                ORDER BY lp.change_24h ASC, lp.asset_id
                LIMIT limit_param;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION get_crypto_history(asset_id_param TEXT, days_param INTEGER DEFAULT 7)
            RETURNS TABLE (
                observed_at TIMESTAMPTZ,
                price NUMERIC,
                market_cap NUMERIC,
                volume_24h NUMERIC
            )
            LANGUAGE sql STABLE AS $$
                SELECT ph.last_updated, ph.price, ph.market_cap, ph.volume_24h
                FROM price_history ph
                WHERE ph.asset_id = asset_id_param
                  AND ph.last_updated >= NOW() - make_interval(days => days_param)
                ORDER BY ph.last_updated ASC;
            $$;
            "#,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP FUNCTION IF EXISTS get_crypto_history(TEXT, INTEGER);")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS get_top_losers(INTEGER);")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS get_top_gainers(INTEGER);")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS get_market_stats();")
            .await?;

        Ok(())
    }
}
