//! Sign convention translation.
//!
//! The API follows USEF, where consumption is positive and production
//! negative. Storage follows the opposite convention. Values are negated
//! exactly once when crossing the boundary in either direction.

/// Translates a single value between the two conventions.
#[inline]
#[must_use]
pub fn translate(value: f64) -> f64 {
    -value
}

/// Converts API (USEF) values to the stored convention.
#[must_use]
pub fn external_to_internal(values: &[f64]) -> Vec<f64> {
    values.iter().copied().map(translate).collect()
}

/// Converts stored values to the API (USEF) convention.
#[must_use]
pub fn internal_to_external(values: &[f64]) -> Vec<f64> {
    values.iter().copied().map(translate).collect()
}
