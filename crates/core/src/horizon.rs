//! Per-value forecast horizons and time windows.
//!
//! A horizon is the lead time between when a value was created and the end
//! of the interval it describes. Meter data is observed after the fact, so
//! its horizons are zero or negative.

use chrono::{DateTime, Duration, Utc};

/// A time window split into equal-width slots by the number of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub duration: Duration,
}

impl Window {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self { start, duration }
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }

    /// Width of one of `n` equal slots. `n` must be non-zero.
    #[must_use]
    pub fn slot_width(&self, n: usize) -> Duration {
        self.duration / n as i32
    }

    /// Start of slot `j` out of `n`.
    #[must_use]
    pub fn slot_start(&self, j: usize, n: usize) -> DateTime<Utc> {
        self.start + (self.duration * j as i32) / n as i32
    }
}

/// Bounds on the horizon of observations eligible for a query.
///
/// `earliest` is the lower bound and `latest` the upper bound, both inclusive.
/// An absent bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HorizonWindow {
    pub earliest: Option<Duration>,
    pub latest: Option<Duration>,
}

impl HorizonWindow {
    #[must_use]
    pub const fn new(earliest: Option<Duration>, latest: Option<Duration>) -> Self {
        Self { earliest, latest }
    }

    /// Any meter data observed at most `horizon` after the fact and not
    /// before the fact.
    #[must_use]
    pub fn ex_post(horizon: Option<Duration>) -> Self {
        Self::new(horizon, Some(Duration::zero()))
    }

    #[must_use]
    pub fn contains(&self, horizon: Duration) -> bool {
        self.earliest.map_or(true, |lower| horizon >= lower)
            && self.latest.map_or(true, |upper| horizon <= upper)
    }
}

/// Horizon of value `j` out of `n` values posted for `window`.
///
/// With a rolling horizon every value shares `horizon`. Otherwise `horizon`
/// refers to the end of the whole window and each value's horizon is
/// shifted by the distance between its slot end and the window end, so the
/// last value keeps `horizon` exactly. `n` must be non-zero.
#[must_use]
pub fn value_horizon(
    window: &Window,
    j: usize,
    n: usize,
    rolling: bool,
    horizon: Duration,
) -> Duration {
    if rolling {
        return horizon;
    }
    let slot_end = window.slot_start(j, n) + window.slot_width(n);
    horizon - (window.end() - slot_end)
}

/// Inverse of [`value_horizon`] for a stored value: the horizon relative to
/// the end of `window`, given the value's slot start and width.
#[must_use]
pub fn nominal_horizon(
    window: &Window,
    datetime: DateTime<Utc>,
    resolution: Duration,
    stored: Duration,
) -> Duration {
    stored + (window.end() - (datetime + resolution))
}
