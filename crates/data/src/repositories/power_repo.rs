//! Power measurement repository.
//!
//! Writes go through a single transaction per batch. The strict path
//! inserts and reports duplicate `(datetime, asset_id)` keys as
//! [`StoreError::UniqueViolation`]; the merge path replaces existing rows.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bvp_core::{resample, IngestBatch, Measurement, PowerQuery, PowerStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use super::forecasting_job_repo::insert_jobs;
use super::store_error;
use crate::models::power::PowerRow;
use crate::models::{from_unix, PowerRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Merge,
}

/// Repository for power measurements.
#[derive(Debug, Clone)]
pub struct PowerRepository {
    pool: SqlitePool,
}

impl PowerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queries stored measurements of one asset within `[start, end)`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_time_range(
        &self,
        asset_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        let rows = sqlx::query_as::<_, (i64, f64, i64, i64)>(
            r"
            SELECT datetime, value, horizon, data_source_id
            FROM power
            WHERE asset_id = ?1 AND datetime >= ?2 AND datetime < ?3
            ORDER BY datetime ASC
            ",
        )
        .bind(asset_id)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(datetime, value, horizon, data_source_id)| {
                Ok(Measurement {
                    datetime: from_unix(datetime)?,
                    value,
                    horizon: Duration::seconds(horizon),
                    asset_id,
                    data_source_id,
                })
            })
            .collect()
    }

    /// Counts all stored measurements.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM power")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn select_rows(
        &self,
        names: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PowerRecord>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r"
            SELECT p.datetime, p.value, p.horizon, p.data_source_id, a.name AS asset_name
            FROM power p
            JOIN asset a ON a.id = p.asset_id
            WHERE p.datetime >= ",
        );
        builder.push_bind(start.timestamp());
        builder.push(" AND p.datetime < ");
        builder.push_bind(end.timestamp());
        builder.push(" AND a.name IN (");
        let mut separated = builder.separated(", ");
        for name in names {
            separated.push_bind(*name);
        }
        separated.push_unseparated(") ORDER BY p.datetime ASC");

        builder
            .build_query_as::<PowerRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn write(&self, batch: &IngestBatch, mode: WriteMode) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        match write_rows(&mut *tx, batch, mode).await {
            Ok(()) => {
                tx.commit().await.map_err(store_error)?;
                debug!(
                    measurements = batch.measurements.len(),
                    jobs = batch.jobs.len(),
                    ?mode,
                    "Committed power batch"
                );
                Ok(())
            }
            Err(e) => {
                tx.rollback().await.map_err(store_error)?;
                Err(store_error(e))
            }
        }
    }
}

async fn write_rows(
    conn: &mut SqliteConnection,
    batch: &IngestBatch,
    mode: WriteMode,
) -> Result<(), sqlx::Error> {
    let sql = match mode {
        WriteMode::Insert => {
            r"
            INSERT INTO power (datetime, asset_id, value, horizon, data_source_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "
        }
        WriteMode::Merge => {
            r"
            INSERT INTO power (datetime, asset_id, value, horizon, data_source_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (datetime, asset_id) DO UPDATE SET
                value = excluded.value,
                horizon = excluded.horizon,
                data_source_id = excluded.data_source_id
            "
        }
    };

    for measurement in &batch.measurements {
        let row = PowerRow::from(measurement);
        sqlx::query(sql)
            .bind(row.datetime)
            .bind(row.asset_id)
            .bind(row.value)
            .bind(row.horizon)
            .bind(row.data_source_id)
            .execute(&mut *conn)
            .await?;
    }

    insert_jobs(conn, &batch.jobs).await
}

#[async_trait]
impl PowerStore for PowerRepository {
    async fn fetch(&self, query: &PowerQuery) -> Result<Vec<(String, Vec<f64>)>, StoreError> {
        let mut names: Vec<&str> = Vec::with_capacity(query.asset_names.len());
        for name in &query.asset_names {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .select_rows(&names, query.window.start, query.window.end())
            .await?;

        let mut by_asset: HashMap<&str, Vec<_>> = HashMap::new();
        for row in &rows {
            by_asset
                .entry(row.asset_name.as_str())
                .or_default()
                .push(row.to_observation()?);
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let observations = by_asset.get(name).map_or(&[][..], Vec::as_slice);
                let values = resample(
                    observations,
                    &query.window,
                    query.resolution,
                    &query.horizon_window,
                    query.rolling,
                    &query.sources,
                );
                (name.to_string(), values)
            })
            .collect())
    }

    async fn bulk_insert(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        self.write(batch, WriteMode::Insert).await
    }

    async fn merge_write(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        self.write(batch, WriteMode::Merge).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAsset;
    use crate::DatabaseClient;
    use bvp_core::{
        ForecastingJob, HorizonWindow, MetricKind, SourceFilter, SourceSelection, Window,
    };
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
    }

    fn measurement(minutes: i64, value: f64, source: i64) -> Measurement {
        Measurement {
            datetime: start() + Duration::minutes(minutes),
            value,
            horizon: Duration::zero(),
            asset_id: 1,
            data_source_id: source,
        }
    }

    async fn seeded() -> (DatabaseClient, i64, i64) {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repos = db.repositories();
        repos
            .assets
            .insert(&NewAsset::new("CS 1", 1).with_id(1))
            .await
            .unwrap();
        let mdc = repos.data_sources.insert("MDC", "script", Some(1)).await.unwrap();
        let other = repos.data_sources.insert("Other", "script", Some(2)).await.unwrap();
        (db, mdc, other)
    }

    fn query(sources: SourceSelection) -> PowerQuery {
        PowerQuery {
            asset_names: vec!["CS 1".to_string(), "CS 1".to_string()],
            window: Window::new(start(), Duration::hours(1)),
            resolution: Duration::minutes(15),
            horizon_window: HorizonWindow::default(),
            rolling: true,
            sources,
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_and_fetch() {
        let (db, mdc, _) = seeded().await;
        let repo = db.repositories().power;
        let batch = IngestBatch {
            measurements: vec![measurement(0, -1.0, mdc), measurement(15, -2.0, mdc)],
            jobs: vec![],
        };
        repo.bulk_insert(&batch).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        let result = repo.fetch(&query(SourceSelection::default())).await.unwrap();
        assert_eq!(result.len(), 1);
        let (name, values) = &result[0];
        assert_eq!(name, "CS 1");
        assert_eq!(values[0], -1.0);
        assert_eq!(values[1], -2.0);
        assert!(values[2].is_nan() && values[3].is_nan());
    }

    #[tokio::test]
    async fn test_conflict_rolls_back_whole_batch() {
        let (db, mdc, _) = seeded().await;
        let repos = db.repositories();
        repos
            .power
            .bulk_insert(&IngestBatch {
                measurements: vec![measurement(15, -2.0, mdc)],
                jobs: vec![],
            })
            .await
            .unwrap();

        let job = ForecastingJob {
            metric_kind: MetricKind::Power,
            asset_id: 1,
            start: start(),
            end: start() + Duration::minutes(15),
        };
        let err = repos
            .power
            .bulk_insert(&IngestBatch {
                measurements: vec![measurement(0, -1.0, mdc), measurement(15, -5.0, mdc)],
                jobs: vec![job],
            })
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(repos.power.count().await.unwrap(), 1);
        assert!(repos.forecasting_jobs.pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_write_replaces_rows() {
        let (db, mdc, other) = seeded().await;
        let repos = db.repositories();
        repos
            .power
            .bulk_insert(&IngestBatch {
                measurements: vec![measurement(0, -1.0, mdc)],
                jobs: vec![],
            })
            .await
            .unwrap();
        repos
            .power
            .merge_write(&IngestBatch {
                measurements: vec![measurement(0, -9.0, other), measurement(15, -3.0, other)],
                jobs: vec![],
            })
            .await
            .unwrap();

        let stored = repos
            .power
            .query_by_time_range(1, start(), start() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].value, -9.0);
        assert_eq!(stored[0].data_source_id, other);
        assert_eq!(stored[1].value, -3.0);
    }

    #[tokio::test]
    async fn test_jobs_commit_with_measurements() {
        let (db, mdc, _) = seeded().await;
        let repos = db.repositories();
        let job = ForecastingJob {
            metric_kind: MetricKind::Power,
            asset_id: 1,
            start: start(),
            end: start() + Duration::minutes(45),
        };
        repos
            .power
            .bulk_insert(&IngestBatch {
                measurements: vec![measurement(0, -1.0, mdc)],
                jobs: vec![job.clone()],
            })
            .await
            .unwrap();

        let pending = repos.forecasting_jobs.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].to_job().unwrap(), job);

        assert!(repos.forecasting_jobs.mark_dispatched(pending[0].id).await.unwrap());
        assert!(!repos.forecasting_jobs.mark_dispatched(pending[0].id).await.unwrap());
        assert!(repos.forecasting_jobs.pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_falls_back_per_slot() {
        let (db, mdc, other) = seeded().await;
        let repo = db.repositories().power;
        repo.bulk_insert(&IngestBatch {
            measurements: vec![measurement(0, -1.0, mdc), measurement(15, -7.0, other)],
            jobs: vec![],
        })
        .await
        .unwrap();

        let preferred_only = repo
            .fetch(&query(SourceSelection {
                preferred: SourceFilter::Only(vec![mdc]),
                fallback: None,
            }))
            .await
            .unwrap();
        assert_eq!(preferred_only[0].1[0], -1.0);
        assert!(preferred_only[0].1[1].is_nan());

        let with_fallback = repo
            .fetch(&query(SourceSelection {
                preferred: SourceFilter::Only(vec![mdc]),
                fallback: Some(SourceFilter::All),
            }))
            .await
            .unwrap();
        assert_eq!(with_fallback[0].1[1], -7.0);
    }

    #[tokio::test]
    async fn test_fetch_unknown_asset_yields_gaps() {
        let (db, _, _) = seeded().await;
        let repo = db.repositories().power;
        let mut q = query(SourceSelection::default());
        q.asset_names = vec!["nope".to_string()];
        let result = repo.fetch(&q).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].1.iter().all(|v| v.is_nan()));
    }
}
