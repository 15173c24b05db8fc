//! Sync status service for tracking last successful sync times
//!
//! A restarted process consults this table before running a job so that a
//! run whose last success is younger than the job interval is skipped.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::sync_status::{self, Entity as SyncStatus};

/// Job names for tracking sync status
pub mod jobs {
    pub const MARKET_DATA_SYNC: &str = "market_data_sync";
}

/// Check if a sync job should run based on last successful sync time
///
/// Returns true if:
/// - No record exists for this job (first run)
/// - The job never succeeded
/// - Last successful sync was at least `interval_secs` ago
pub async fn should_sync(
    db: &DatabaseConnection,
    job_name: &str,
    interval_secs: i32,
) -> Result<bool, DbErr> {
    let status = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let Some(record) = status else {
        tracing::info!(job = job_name, "First run detected, will sync");
        return Ok(true);
    };

    let Some(last_success) = record.last_success_at else {
        tracing::info!(job = job_name, "No previous successful sync, will sync");
        return Ok(true);
    };

    let elapsed = Utc::now().fixed_offset().signed_duration_since(last_success);
    let interval = Duration::seconds(interval_secs as i64);

    if elapsed >= interval {
        tracing::info!(
            job = job_name,
            elapsed_secs = elapsed.num_seconds(),
            min_interval_secs = interval_secs,
            "Last sync is stale, will sync"
        );
        Ok(true)
    } else {
        tracing::info!(
            job = job_name,
            elapsed_secs = elapsed.num_seconds(),
            next_sync_in_secs = (interval - elapsed).num_seconds(),
            "Skipping sync, last success is recent"
        );
        Ok(false)
    }
}

/// Record a successful sync
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    interval_secs: i32,
) -> Result<(), DbErr> {
    let now = Utc::now().fixed_offset();

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let success_count = record.success_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_success_at = Set(Some(now));
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(None);
            active_model.success_count = Set(success_count + 1);
            active_model.min_interval_secs = Set(interval_secs);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(Some(now)),
                last_attempt_at: Set(Some(now)),
                last_error: Set(None),
                success_count: Set(1),
                error_count: Set(0),
                min_interval_secs: Set(interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, "Recorded successful sync");
    Ok(())
}

/// Record a failed sync attempt
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
    interval_secs: i32,
) -> Result<(), DbErr> {
    let now = Utc::now().fixed_offset();

    let existing = SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let error_count = record.error_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(Some(error.to_string()));
            active_model.error_count = Set(error_count + 1);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(None),
                last_attempt_at: Set(Some(now)),
                last_error: Set(Some(error.to_string())),
                success_count: Set(0),
                error_count: Set(1),
                min_interval_secs: Set(interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!(job = job_name, error, "Recorded failed sync");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn record(last_success_secs_ago: Option<i64>) -> sync_status::Model {
        let now = Utc::now().fixed_offset();
        sync_status::Model {
            id: 1,
            job_name: jobs::MARKET_DATA_SYNC.to_string(),
            last_success_at: last_success_secs_ago.map(|s| now - Duration::seconds(s)),
            last_attempt_at: None,
            last_error: None,
            success_count: 3,
            error_count: 0,
            min_interval_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_should_sync_first_run() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<sync_status::Model>::new()])
            .into_connection();

        assert!(should_sync(&db, jobs::MARKET_DATA_SYNC, 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_sync_respects_interval() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record(Some(60))]])
            .append_query_results([vec![record(Some(900))]])
            .append_query_results([vec![record(None)]])
            .into_connection();

        assert!(!should_sync(&db, jobs::MARKET_DATA_SYNC, 300).await.unwrap());
        assert!(should_sync(&db, jobs::MARKET_DATA_SYNC, 300).await.unwrap());
        assert!(should_sync(&db, jobs::MARKET_DATA_SYNC, 300).await.unwrap());
    }
}
