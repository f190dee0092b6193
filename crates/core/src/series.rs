//! Resampling of stored observations into equal-width query bins.

use chrono::{DateTime, Duration, Utc};

use crate::horizon::{nominal_horizon, HorizonWindow, Window};
use crate::types::SourceSelection;

/// A stored reading as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub datetime: DateTime<Utc>,
    pub value: f64,
    pub horizon: Duration,
    pub data_source_id: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Number of `resolution`-wide bins in `window`, or zero for a
/// non-positive resolution.
#[must_use]
pub fn bin_count(window: &Window, resolution: Duration) -> usize {
    let res = resolution.num_milliseconds();
    if res <= 0 {
        return 0;
    }
    usize::try_from(window.duration.num_milliseconds() / res).unwrap_or(0)
}

/// Averages observations into `resolution`-wide bins covering `window`.
///
/// Observations outside the window or the horizon window are ignored. With
/// `rolling` false, horizons are compared relative to the window end. A bin
/// without preferred-source data takes the fallback mean if a fallback is
/// configured, and is `NaN` when nothing remains.
#[must_use]
pub fn resample(
    observations: &[Observation],
    window: &Window,
    resolution: Duration,
    horizon_window: &HorizonWindow,
    rolling: bool,
    sources: &SourceSelection,
) -> Vec<f64> {
    let n = bin_count(window, resolution);
    let res_ms = resolution.num_milliseconds();
    let mut preferred = vec![Mean::default(); n];
    let mut fallback = vec![Mean::default(); n];

    for obs in observations {
        let offset = (obs.datetime - window.start).num_milliseconds();
        if offset < 0 || res_ms <= 0 {
            continue;
        }
        let Ok(bin) = usize::try_from(offset / res_ms) else {
            continue;
        };
        if bin >= n {
            continue;
        }

        let horizon = if rolling {
            obs.horizon
        } else {
            nominal_horizon(window, obs.datetime, resolution, obs.horizon)
        };
        if !horizon_window.contains(horizon) {
            continue;
        }

        if sources.preferred.admits(obs.data_source_id) {
            preferred[bin].add(obs.value);
        }
        if let Some(filter) = &sources.fallback {
            if filter.admits(obs.data_source_id) {
                fallback[bin].add(obs.value);
            }
        }
    }

    preferred
        .into_iter()
        .zip(fallback)
        .map(|(p, f)| p.get().or_else(|| f.get()).unwrap_or(f64::NAN))
        .collect()
}
