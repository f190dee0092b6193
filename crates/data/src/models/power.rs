use anyhow::Result;
use bvp_core::{Measurement, Observation};
use chrono::Duration;

use super::from_unix;

/// A stored power reading joined with its asset name.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PowerRecord {
    pub datetime: i64,
    pub value: f64,
    pub horizon: i64,
    pub data_source_id: i64,
    pub asset_name: String,
}

impl PowerRecord {
    /// Converts the row into an observation for resampling.
    ///
    /// # Errors
    /// Returns an error if the stored timestamp is out of range.
    pub fn to_observation(&self) -> Result<Observation> {
        Ok(Observation {
            datetime: from_unix(self.datetime)?,
            value: self.value,
            horizon: Duration::seconds(self.horizon),
            data_source_id: self.data_source_id,
        })
    }
}

/// Column values bound when writing a measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PowerRow {
    pub datetime: i64,
    pub asset_id: i64,
    pub value: f64,
    pub horizon: i64,
    pub data_source_id: i64,
}

impl From<&Measurement> for PowerRow {
    fn from(m: &Measurement) -> Self {
        Self {
            datetime: m.datetime.timestamp(),
            asset_id: m.asset_id,
            value: m.value,
            horizon: m.horizon.num_seconds(),
            data_source_id: m.data_source_id,
        }
    }
}
