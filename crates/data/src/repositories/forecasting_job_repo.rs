//! Forecasting job outbox.
//!
//! Jobs are written in the same transaction as the measurements that
//! triggered them and picked up from here by the job queue.

use anyhow::Result;
use bvp_core::ForecastingJob;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::ForecastingJobRecord;

#[derive(Debug, Clone)]
pub struct ForecastingJobRepository {
    pool: SqlitePool,
}

impl ForecastingJobRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lists jobs not yet dispatched, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn pending(&self, limit: i64) -> Result<Vec<ForecastingJobRecord>> {
        let records = sqlx::query_as::<_, ForecastingJobRecord>(
            r"
            SELECT id, metric_kind, asset_id, start_time, end_time, created_at, dispatched_at
            FROM forecasting_job
            WHERE dispatched_at IS NULL
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Marks a job as handed to the queue.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn mark_dispatched(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE forecasting_job SET dispatched_at = ?1 WHERE id = ?2 AND dispatched_at IS NULL",
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Inserts jobs on an open connection, typically inside a transaction.
pub(crate) async fn insert_jobs(
    conn: &mut SqliteConnection,
    jobs: &[ForecastingJob],
) -> Result<(), sqlx::Error> {
    let created_at = Utc::now().timestamp();
    for job in jobs {
        sqlx::query(
            r"
            INSERT INTO forecasting_job (metric_kind, asset_id, start_time, end_time, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(job.metric_kind.as_str())
        .bind(job.asset_id)
        .bind(job.start.timestamp())
        .bind(job.end.timestamp())
        .bind(created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
