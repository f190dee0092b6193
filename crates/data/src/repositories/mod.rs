//! Database repositories for metering data.
//!
//! Each repository provides typed access to one table and implements the
//! matching storage trait of `bvp-core`.

pub mod asset_repo;
pub mod data_source_repo;
pub mod forecasting_job_repo;
pub mod power_repo;

pub use asset_repo::AssetRepository;
pub use data_source_repo::DataSourceRepository;
pub use forecasting_job_repo::ForecastingJobRepository;
pub use power_repo::PowerRepository;

use bvp_core::StoreError;
use sqlx::SqlitePool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub assets: AssetRepository,
    pub data_sources: DataSourceRepository,
    pub power: PowerRepository,
    pub forecasting_jobs: ForecastingJobRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            assets: AssetRepository::new(pool.clone()),
            data_sources: DataSourceRepository::new(pool.clone()),
            power: PowerRepository::new(pool.clone()),
            forecasting_jobs: ForecastingJobRepository::new(pool),
        }
    }
}

/// Maps a driver error, keeping unique-key violations distinguishable.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation {
                detail: db_err.message().to_string(),
            };
        }
    }
    StoreError::Backend(err.into())
}
