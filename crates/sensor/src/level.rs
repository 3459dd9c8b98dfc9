//! Water level from an averaged distance and calibration bounds.
//!
//! The distance below the full level is snapped to `0` or `max_distance` when
//! it lies within `min_max_uncertainty` of either bound, so readings near the
//! extremes report exactly full or exactly empty.

use chrono::{DateTime, Utc};
use hydrosonde_core::{CalibrationInfo, LevelResult, Result};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamped distance between the full level and the water surface.
pub fn distance_from_max(averaged_distance: f64, calib: &CalibrationInfo) -> f64 {
    let mut distance = round2(averaged_distance - calib.min_distance);

    if distance - calib.min_max_uncertainty < 0.0 {
        distance = 0.0;
    }
    if distance + calib.min_max_uncertainty > calib.max_distance {
        distance = calib.max_distance;
    }
    distance
}

/// Compute the level now.
pub fn compute(averaged_distance: f64, calib: &CalibrationInfo) -> Result<LevelResult> {
    compute_at(averaged_distance, calib, Utc::now())
}

/// Compute the level stamped with `timestamp`.
pub fn compute_at(
    averaged_distance: f64,
    calib: &CalibrationInfo,
    timestamp: DateTime<Utc>,
) -> Result<LevelResult> {
    calib.validate()?;

    let height = round2(calib.max_distance - distance_from_max(averaged_distance, calib));
    let percentage = (height / calib.max_distance * 100.0).round() as i32;

    Ok(LevelResult {
        height,
        percentage,
        timestamp,
    })
}
