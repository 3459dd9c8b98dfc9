use std::env;
use std::process;

use anyhow::Context;
use hydrosonde_core::config::{DEFAULT_CONFIG_FILE, ENV_CONFIG_PATH};
use hydrosonde_core::{logging, Config};
use tracing::{error, info};

mod pipeline;
mod supervisor;

use supervisor::Supervisor;

/// Exit status when the error budget runs out.
const EXIT_BUDGET_EXCEEDED: i32 = 1;
/// Exit status for configuration that cannot start a run.
const EXIT_BAD_CONFIG: i32 = 2;

fn main() -> anyhow::Result<()> {
    let config_path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            logging::init();
            error!(path = %config_path, error = %err, "Fatal configuration error");
            process::exit(EXIT_BAD_CONFIG);
        }
    };

    logging::init_from_config(&config.logging).context("failed to initialize logging")?;

    info!(
        config = %config_path,
        trigger_pin = ?config.hardware.trigger_pin,
        echo_pin = ?config.hardware.echo_pin,
        debug = config.hardware.debug,
        db = %config.store.path.display(),
        "Hydrosonde node starting"
    );

    let mut supervisor = Supervisor::new(&config.supervisor);
    if let Err(err) = supervisor.run(|| pipeline::run(&config)) {
        error!(error = %err, "The error limit has been surpassed, shutting down");
        process::exit(EXIT_BUDGET_EXCEEDED);
    }

    info!("Hydrosonde node stopped");
    Ok(())
}
