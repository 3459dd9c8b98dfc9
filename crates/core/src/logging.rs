//! Structured logging infrastructure for Hydrosonde.
//!
//! Centralised `tracing-subscriber` initialization. The level is taken from
//! `RUST_LOG` and defaults to `info`; set `RUST_LOG=debug` to see rejected
//! samples and echo timeouts.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::Result;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system with human-readable output on stderr.
///
/// # Example
/// ```no_run
/// use hydrosonde_core::logging;
///
/// logging::init();
/// tracing::info!("Sensor started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Initialize the logging system with JSON output for log aggregation.
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_target(true))
        .init();
}

/// Initialize the logging system appending plain-text lines to `path`.
///
/// The file is created if missing. Fails only when the file cannot be opened.
pub fn init_file(path: impl AsRef<Path>) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// Initialize logging according to the `[logging]` config section.
///
/// A log file takes precedence over the JSON flag.
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    match (&config.file, config.json) {
        (Some(path), _) => init_file(path),
        (None, true) => {
            init_json();
            Ok(())
        }
        (None, false) => {
            init();
            Ok(())
        }
    }
}
