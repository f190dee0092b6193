//! Row models for the metering tables.
//!
//! Timestamps are stored as Unix seconds and horizons as seconds. Models
//! derive `sqlx::FromRow` and convert into the domain types of `bvp-core`.

pub mod asset;
pub mod data_source;
pub mod forecasting_job;
pub mod power;

pub use asset::{AssetRecord, NewAsset};
pub use data_source::DataSourceRecord;
pub use forecasting_job::ForecastingJobRecord;
pub use power::PowerRecord;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

pub(crate) fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| anyhow!("timestamp out of range: {seconds}"))
}
