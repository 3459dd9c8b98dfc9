//! Core functionality for the Hydrosonde water level sensor.
//!
//! This crate provides the shared types, collaborator interfaces, error
//! taxonomy, configuration and logging setup used across the workspace.

pub mod config;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod types;

pub use config::{Config, ConfigError, PinPair};
pub use error::{Error, Result};
pub use interfaces::{CalibrationSource, ReadingSink, StaticCalibration};
pub use types::{CalibrationInfo, LevelResult};
