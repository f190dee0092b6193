//! Data storage for power metering.
//!
//! This crate provides:
//! - `SQLite` database client with embedded migrations
//! - Row models for assets, data sources, power and forecasting jobs
//! - Repositories implementing the storage traits of `bvp-core`

pub mod database;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;

pub use models::{AssetRecord, DataSourceRecord, ForecastingJobRecord, NewAsset, PowerRecord};

pub use repositories::{
    AssetRepository, DataSourceRepository, ForecastingJobRepository, PowerRepository,
    Repositories,
};
