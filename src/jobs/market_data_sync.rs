//! Market data sync job
//!
//! Pulls the asset list and the global aggregate from the price feed,
//! normalizes the records and writes them in sequential batches, then
//! recomputes the market aggregate from the stored snapshot.
//! Supports graceful shutdown via Ctrl-C between runs.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;
use sea_orm::DatabaseConnection;
use tokio::time::{Duration, MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::error::{FeedError, IngestError};
use crate::services::aggregate::{self, FeedTotals};
use crate::services::feed::MarketFeed;
use crate::services::market_store::MarketStore;
use crate::services::normalizer::{self, NormalizedAsset};
use crate::services::sync_status::{self, jobs};

/// Cap on the backoff exponent so delays cannot overflow
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Cumulative counters for the lifetime of the process
#[derive(Debug, Default)]
pub struct IngestStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    records_processed: AtomicU64,
    records_rejected: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub records_processed: u64,
    pub records_rejected: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of one successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub stored: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub batches: usize,
    pub global_fetched: bool,
}

pub struct IngestionJob {
    feed: Arc<dyn MarketFeed>,
    store: Arc<dyn MarketStore>,
    settings: IngestConfig,
    stats: IngestStats,
}

impl IngestionJob {
    pub fn new(feed: Arc<dyn MarketFeed>, store: Arc<dyn MarketStore>, settings: IngestConfig) -> Self {
        Self {
            feed,
            store,
            settings,
            stats: IngestStats::default(),
        }
    }

    pub fn settings(&self) -> &IngestConfig {
        &self.settings
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one fetch-normalize-store cycle and log the cumulative counters.
    pub async fn run_once(&self) -> Result<RunReport, IngestError> {
        let started = Instant::now();
        let result = self.execute().await;

        match &result {
            Ok(report) => {
                self.stats.runs_succeeded.fetch_add(1, Ordering::Relaxed);
                info!(
                    fetched = report.fetched,
                    stored = report.stored,
                    rejected = report.rejected,
                    duplicates = report.duplicates,
                    batches = report.batches,
                    global_fetched = report.global_fetched,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Market data sync completed"
                );
            }
            Err(e) => {
                self.stats.runs_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    kind = %e.kind(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Market data sync failed"
                );
            }
        }

        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            successful_requests = stats.successful_requests,
            failed_requests = stats.failed_requests,
            records_processed = stats.records_processed,
            records_rejected = stats.records_rejected,
            runs_succeeded = stats.runs_succeeded,
            runs_failed = stats.runs_failed,
            "Ingestion stats"
        );

        result
    }

    async fn execute(&self) -> Result<RunReport, IngestError> {
        let run_started_at = Utc::now();
        let per_page = self.settings.per_page;

        info!(
            pages = self.settings.pages,
            per_page,
            "Starting market data sync"
        );

        // Pages are staggered by the rate-limit delay so concurrent first
        // attempts do not hit the feed at the same instant.
        let page_fetches = (1..=self.settings.pages).map(|page| {
            let stagger = self.settings.rate_limit_delay.saturating_mul(page - 1);
            async move {
                sleep(stagger).await;
                self.fetch_with_retry("/coins/markets", || self.feed.fetch_markets(page, per_page))
                    .await
            }
        });

        let (pages, global) = tokio::join!(
            join_all(page_fetches),
            self.fetch_with_retry("/global", || self.feed.fetch_global())
        );

        let mut raws = Vec::new();
        for page in pages {
            raws.extend(page?);
        }

        let feed_totals = match global {
            Ok(global) => Some(FeedTotals::from(&global)),
            Err(e) => {
                warn!(error = %e, "Global market fetch failed, continuing without feed totals");
                None
            }
        };

        let outcome = normalizer::normalize_all(&raws, run_started_at);
        self.stats
            .records_rejected
            .fetch_add(outcome.rejected as u64, Ordering::Relaxed);

        if outcome.assets.is_empty() {
            return Err(IngestError::Validation(format!(
                "{} records fetched, none passed validation",
                raws.len()
            )));
        }

        let mut stored = 0;
        let mut batches = 0;
        for (index, batch) in outcome.assets.chunks(self.settings.batch_size).enumerate() {
            self.store_with_retry(index, batch).await?;
            stored += batch.len();
            batches += 1;
            self.stats
                .records_processed
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
        }

        let snapshot = self.store.latest_snapshot().await?;
        let mut market = aggregate::compute(&snapshot);
        market.feed = feed_totals;
        let global_fetched = market.feed.is_some();
        self.store.insert_market_stats(&market).await?;

        info!(
            total_market_cap = %market.total_market_cap,
            btc_dominance = %market.btc_dominance,
            eth_dominance = %market.eth_dominance,
            active_assets = market.active_assets,
            "Market aggregate recorded"
        );

        Ok(RunReport {
            fetched: raws.len(),
            stored,
            rejected: outcome.rejected,
            duplicates: outcome.duplicates,
            batches,
            global_fetched,
        })
    }

    /// Call the feed up to `max_retries` times with exponential backoff.
    async fn fetch_with_retry<T, F, Fut>(&self, endpoint: &str, f: F) -> Result<T, FeedError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let max_attempts = self.settings.max_retries.max(1);
        let mut attempts = 0;

        loop {
            sleep(self.settings.rate_limit_delay).await;
            self.stats.total_requests.fetch_add(1, Ordering::Relaxed);

            match f().await {
                Ok(value) => {
                    self.stats.successful_requests.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) => {
                    self.stats.failed_requests.fetch_add(1, Ordering::Relaxed);
                    attempts += 1;

                    if attempts >= max_attempts {
                        error!(
                            endpoint,
                            attempts,
                            error = %e,
                            "Max retries exceeded"
                        );
                        return Err(e);
                    }

                    let delay = backoff(self.settings.retry_base_delay, attempts);
                    warn!(
                        endpoint,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        rate_limited = matches!(e, FeedError::RateLimited { .. }),
                        error = %e,
                        "Feed request failed, retrying..."
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn store_with_retry(&self, index: usize, batch: &[NormalizedAsset]) -> Result<(), IngestError> {
        let max_attempts = self.settings.batch_max_retries.max(1);
        let mut attempts = 0;

        loop {
            match self.store.upsert_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;

                    if attempts >= max_attempts {
                        error!(
                            batch = index,
                            attempts,
                            error = %e,
                            "Batch write failed, giving up"
                        );
                        return Err(IngestError::Persistence(e));
                    }

                    let delay = backoff(self.settings.batch_retry_delay, attempts);
                    warn!(
                        batch = index,
                        attempt = attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch write failed, retrying..."
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// `base * 2^(attempt - 1)`: the first retry waits `base`
fn backoff(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    base.saturating_mul(1u32 << shift)
}

/// Start the market data sync job in the background
///
/// Runs immediately (unless `sync_status` shows a recent success) and then
/// every `update_interval`. An interval of zero runs once.
pub async fn start_market_data_sync_job(db: DatabaseConnection, job: Arc<IngestionJob>) {
    tokio::spawn(async move {
        run_scheduled(db, job).await;
    });
}

/// Drive the job in the foreground until Ctrl-C, or once for a zero interval.
pub async fn run_scheduled(db: DatabaseConnection, job: Arc<IngestionJob>) {
    run_until(db, job, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping market data sync job");
    })
    .await;
}

/// Scheduling loop stopped by `shutdown`. The signal is listened for across
/// runs, so one that fires mid-run stops the loop once that run finishes.
pub async fn run_until<S>(db: DatabaseConnection, job: Arc<IngestionJob>, shutdown: S)
where
    S: Future<Output = ()>,
{
    let update_interval = job.settings().update_interval;

    if job.settings().is_one_shot() {
        info!("Running single market data sync");
        let _ = run_tracked(&db, &job).await;
        return;
    }

    let interval_secs = interval_secs(update_interval);
    info!(interval_secs, "Market data sync job started");

    let mut ticker = interval(update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first_tick = true;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if first_tick {
                    first_tick = false;
                    match sync_status::should_sync(&db, jobs::MARKET_DATA_SYNC, interval_secs).await {
                        Ok(false) => continue,
                        Ok(true) => {}
                        Err(e) => warn!(error = %e, "Could not read sync status, syncing anyway"),
                    }
                }

                let _ = run_tracked(&db, &job).await;
            }
        }
    }

    info!("Market data sync job stopped");
}

/// One run with its outcome written to `sync_status`
pub async fn run_tracked(db: &DatabaseConnection, job: &IngestionJob) -> Result<RunReport, IngestError> {
    let interval_secs = interval_secs(job.settings().update_interval);

    let outcome = job.run_once().await;
    let recorded = match &outcome {
        Ok(_) => sync_status::record_success(db, jobs::MARKET_DATA_SYNC, interval_secs).await,
        Err(e) => {
            let message = format!("{}: {}", e.kind(), e);
            sync_status::record_failure(db, jobs::MARKET_DATA_SYNC, &message, interval_secs).await
        }
    };

    if let Err(e) = recorded {
        warn!(error = %e, "Failed to record sync status");
    }

    outcome
}

fn interval_secs(interval: Duration) -> i32 {
    i32::try_from(interval.as_secs()).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(10_000);

        assert_eq!(backoff(base, 1), Duration::from_millis(10_000));
        assert_eq!(backoff(base, 2), Duration::from_millis(20_000));
        assert_eq!(backoff(base, 4), Duration::from_millis(80_000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff(base, 40), backoff(base, MAX_BACKOFF_SHIFT + 1));
    }

    #[test]
    fn test_interval_secs_saturates() {
        assert_eq!(interval_secs(Duration::from_secs(300)), 300);
        assert_eq!(interval_secs(Duration::from_secs(u64::MAX)), i32::MAX);
    }
}
