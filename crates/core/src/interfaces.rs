//! Collaborator interfaces at the edge of the measurement pipeline.
//!
//! The pipeline only ever talks to storage and calibration through these
//! traits, so the sensor crate stays independent of any backend.

use crate::error::Result;
use crate::types::{CalibrationInfo, LevelResult};

/// Destination for computed levels.
///
/// One call per averaged reading. Implementations must tolerate being called
/// again after a failed write; a failure is counted against the error budget.
pub trait ReadingSink {
    /// Append a single reading.
    fn insert_reading(&mut self, reading: &LevelResult) -> Result<()>;
}

/// Provider of calibration constants, read once per measurement cycle.
pub trait CalibrationSource {
    /// Load the current calibration.
    fn load_calibration(&mut self) -> Result<CalibrationInfo>;
}

/// Calibration fixed at construction time (e.g. from the config file).
#[derive(Debug, Clone, Copy)]
pub struct StaticCalibration(pub CalibrationInfo);

impl CalibrationSource for StaticCalibration {
    fn load_calibration(&mut self) -> Result<CalibrationInfo> {
        Ok(self.0)
    }
}

impl<T: ReadingSink + ?Sized> ReadingSink for Box<T> {
    fn insert_reading(&mut self, reading: &LevelResult) -> Result<()> {
        (**self).insert_reading(reading)
    }
}

impl<T: CalibrationSource + ?Sized> CalibrationSource for Box<T> {
    fn load_calibration(&mut self) -> Result<CalibrationInfo> {
        (**self).load_calibration()
    }
}
