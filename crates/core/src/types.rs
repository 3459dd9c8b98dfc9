//! Core types shared between the sensor pipeline and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Calibration key for the sensor-to-empty distance span.
pub const KEY_MAX_DISTANCE: &str = "Max_Distance";
/// Calibration key for the sensor-to-full-level offset.
pub const KEY_MIN_DISTANCE: &str = "Min_Distance";
/// Calibration key for the snapping tolerance at both bounds.
pub const KEY_MIN_MAX_UNCERTAINTY: &str = "Min_Max_Uncertainty";

/// Physical constants needed to turn a raw distance into a water level.
///
/// All values are lengths in the same unit as the sampled distance (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInfo {
    /// Distance span between the full and the empty level
    #[serde(alias = "Max_Distance")]
    pub max_distance: f64,
    /// Distance between the sensor face and the full level
    #[serde(alias = "Min_Distance")]
    pub min_distance: f64,
    /// Tolerance within which a value is snapped to a bound
    #[serde(alias = "Min_Max_Uncertainty")]
    pub min_max_uncertainty: f64,
}

impl CalibrationInfo {
    pub fn new(max_distance: f64, min_distance: f64, min_max_uncertainty: f64) -> Self {
        Self {
            max_distance,
            min_distance,
            min_max_uncertainty,
        }
    }

    /// Check `max_distance > min_distance >= 0` and a non-negative uncertainty.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance > 0.0) {
            return Err(Error::invalid_config(format!(
                "{} must be positive, got {}",
                KEY_MAX_DISTANCE, self.max_distance
            )));
        }
        if !(self.min_distance >= 0.0) {
            return Err(Error::invalid_config(format!(
                "{} must be non-negative, got {}",
                KEY_MIN_DISTANCE, self.min_distance
            )));
        }
        if self.max_distance <= self.min_distance {
            return Err(Error::invalid_config(format!(
                "{} ({}) must exceed {} ({})",
                KEY_MAX_DISTANCE, self.max_distance, KEY_MIN_DISTANCE, self.min_distance
            )));
        }
        if !(self.min_max_uncertainty >= 0.0) {
            return Err(Error::invalid_config(format!(
                "{} must be non-negative, got {}",
                KEY_MIN_MAX_UNCERTAINTY, self.min_max_uncertainty
            )));
        }
        Ok(())
    }
}

/// A computed water level, ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    /// Water height above the empty level, clamped to `[0, max_distance]`
    pub height: f64,
    /// Height as an integer percentage of `max_distance`
    pub percentage: i32,
    /// Time the level was computed
    pub timestamp: DateTime<Utc>,
}
