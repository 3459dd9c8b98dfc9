//! Configuration management for Hydrosonde.
//!
//! Settings come from a TOML file with environment overrides for the values
//! that differ per installation (pins, debug flag, database path).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::CalibrationInfo;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "HYDROSONDE_CONFIG";
/// Environment variable overriding `hardware.trigger_pin`.
pub const ENV_TRIGGER_PIN: &str = "HYDROSONDE_TRIGGER_PIN";
/// Environment variable overriding `hardware.echo_pin`.
pub const ENV_ECHO_PIN: &str = "HYDROSONDE_ECHO_PIN";
/// Environment variable overriding `hardware.debug`.
pub const ENV_DEBUG: &str = "HYDROSONDE_DEBUG";
/// Environment variable overriding `store.path`.
pub const ENV_DB_PATH: &str = "HYDROSONDE_DB_PATH";

/// Default config file name when `HYDROSONDE_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "hydrosonde.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[cfg(feature = "toml")]
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Trigger/echo pin pair, BCM numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinPair {
    pub trigger: u8,
    pub echo: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub trigger_pin: Option<u8>,
    pub echo_pin: Option<u8>,
    /// Replace the GPIO pulse timer with the synthetic distance generator
    pub debug: bool,
    pub trigger_pulse_us: u64,
    /// Per-phase wait for an echo edge
    pub phase_timeout_ms: u64,
    /// Pause before re-triggering when no rising edge arrived
    pub retrigger_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_count: usize,
    pub inter_sample_delay_ms: u64,
    /// Distances above this are treated as noise
    pub reject_ceiling: f64,
    /// Speed of sound, distance units per second
    pub speed_of_propagation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub allowed_errors_per_minute: u32,
    pub window_secs: u64,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hardware: HardwareConfig,
    pub sampling: SamplingConfig,
    pub supervisor: SupervisorConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    /// Fixed calibration; when absent it is read from the store
    pub calibration: Option<CalibrationInfo>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            trigger_pin: None,
            echo_pin: None,
            debug: false,
            trigger_pulse_us: 100,
            phase_timeout_ms: 500,
            retrigger_delay_ms: 100,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_count: 1000,
            inter_sample_delay_ms: 50,
            reject_ceiling: 0.85,
            speed_of_propagation: 343.0,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            allowed_errors_per_minute: 10,
            window_secs: 60,
            backoff_ms: 200,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sensor.db"),
        }
    }
}

impl HardwareConfig {
    /// Both pins, or the first one that is missing.
    pub fn pins(&self) -> Result<PinPair, ConfigError> {
        let trigger = self.trigger_pin.ok_or(ConfigError::Missing(ENV_TRIGGER_PIN))?;
        let echo = self.echo_pin.ok_or(ConfigError::Missing(ENV_ECHO_PIN))?;
        Ok(PinPair { trigger, echo })
    }

    pub fn trigger_pulse(&self) -> Duration {
        Duration::from_micros(self.trigger_pulse_us)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }

    pub fn retrigger_delay(&self) -> Duration {
        Duration::from_millis(self.retrigger_delay_ms)
    }
}

impl SamplingConfig {
    pub fn inter_sample_delay(&self) -> Duration {
        Duration::from_millis(self.inter_sample_delay_ms)
    }
}

impl SupervisorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file at `path` if it exists, otherwise start from defaults,
    /// then apply environment overrides and validate.
    #[cfg(feature = "toml")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TRIGGER_PIN) {
            self.hardware.trigger_pin = Some(parse_pin(ENV_TRIGGER_PIN, &value)?);
        }
        if let Some(value) = lookup(ENV_ECHO_PIN) {
            self.hardware.echo_pin = Some(parse_pin(ENV_ECHO_PIN, &value)?);
        }
        if let Some(value) = lookup(ENV_DEBUG) {
            self.hardware.debug = parse_flag(ENV_DEBUG, &value)?;
        }
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.store.path = PathBuf::from(value);
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hardware.pins()?;

        if self.hardware.phase_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "hardware.phase_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.sampling.sample_count == 0 {
            return Err(ConfigError::ValidationError(
                "sampling.sample_count must be greater than zero".to_string(),
            ));
        }
        if !(self.sampling.reject_ceiling > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "sampling.reject_ceiling must be positive, got {}",
                self.sampling.reject_ceiling
            )));
        }
        if !(self.sampling.speed_of_propagation > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "sampling.speed_of_propagation must be positive, got {}",
                self.sampling.speed_of_propagation
            )));
        }
        if self.supervisor.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.window_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(calibration) = &self.calibration {
            calibration
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }
        Ok(())
    }
}

fn parse_pin(key: &'static str, value: &str) -> Result<u8, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
