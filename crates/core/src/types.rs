//! Domain types shared by the pipelines and the storage layer.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::address::AddressScheme;
use crate::horizon::{HorizonWindow, Window};

/// A metered asset as addressed by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub is_pure_consumer: bool,
    pub is_pure_producer: bool,
}

impl Connection {
    #[must_use]
    pub fn entity_address(&self, scheme: &AddressScheme) -> String {
        scheme.connection_address(self.owner_id, self.id)
    }
}

/// Identity of a writer of measurements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    pub user_id: Option<i64>,
}

/// A single persisted power reading in the stored sign convention.
///
/// `(datetime, asset_id)` is unique in storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub datetime: DateTime<Utc>,
    pub value: f64,
    pub horizon: Duration,
    pub asset_id: i64,
    pub data_source_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Power,
}

impl MetricKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Power => "Power",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a forecasting job for the external job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastingJob {
    pub metric_kind: MetricKind,
    pub asset_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Everything written by one ingestion request, committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub measurements: Vec<Measurement>,
    pub jobs: Vec<ForecastingJob>,
}

impl IngestBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty() && self.jobs.is_empty()
    }
}

/// Which data sources a query reads from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Only(Vec<i64>),
}

impl SourceFilter {
    #[must_use]
    pub fn admits(&self, data_source_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&data_source_id),
        }
    }
}

/// Preferred sources, with optional fallback sources used for slots where
/// the preferred sources have no data. `fallback: None` means no fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSelection {
    pub preferred: SourceFilter,
    pub fallback: Option<SourceFilter>,
}

/// Read request handed to the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerQuery {
    pub asset_names: Vec<String>,
    pub window: Window,
    pub resolution: Duration,
    pub horizon_window: HorizonWindow,
    pub rolling: bool,
    pub sources: SourceSelection,
}

/// The caller's identity and the connections it may address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthContext {
    pub user_id: i64,
    pub authorized_connection_ids: HashSet<i64>,
}

impl AuthContext {
    #[must_use]
    pub fn new(user_id: i64, authorized_connection_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            user_id,
            authorized_connection_ids: authorized_connection_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_authorized(&self, asset_id: i64) -> bool {
        self.authorized_connection_ids.contains(&asset_id)
    }
}
