use anyhow::{bail, Result};
use bvp_core::{ForecastingJob, MetricKind};
use serde::{Deserialize, Serialize};

use super::from_unix;

/// A queued forecasting job awaiting dispatch to the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForecastingJobRecord {
    pub id: i64,
    pub metric_kind: String,
    pub asset_id: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub created_at: i64,
    pub dispatched_at: Option<i64>,
}

impl ForecastingJobRecord {
    /// Converts the row back into a job descriptor.
    ///
    /// # Errors
    /// Returns an error for an unknown metric kind or out-of-range timestamps.
    pub fn to_job(&self) -> Result<ForecastingJob> {
        let metric_kind = match self.metric_kind.as_str() {
            "Power" => MetricKind::Power,
            other => bail!("unknown metric kind: {other}"),
        };
        Ok(ForecastingJob {
            metric_kind,
            asset_id: self.asset_id,
            start: from_unix(self.start_time)?,
            end: from_unix(self.end_time)?,
        })
    }
}
