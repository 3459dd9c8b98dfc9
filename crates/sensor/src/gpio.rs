//! Raspberry Pi GPIO backend (`rpi` feature).

use hydrosonde_core::{Error, PinPair, Result};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::info;

use crate::pulse::{PulseTimer, PulseTiming};

/// Pulse timer over the Pi's GPIO lines.
pub type RpiPulseTimer = PulseTimer<OutputPin, InputPin>;

fn hardware(err: rppal::gpio::Error) -> Error {
    Error::Hardware(err.to_string())
}

/// Claim the trigger and echo lines (BCM numbering) and build a timer.
///
/// Fails if either line is already held in this process. Both lines are
/// returned to their previous state when the timer drops.
pub fn open_pulse_timer(pins: PinPair, timing: PulseTiming) -> Result<RpiPulseTimer> {
    let gpio = Gpio::new().map_err(hardware)?;
    let trigger = gpio.get(pins.trigger).map_err(hardware)?.into_output_low();
    let echo = gpio.get(pins.echo).map_err(hardware)?.into_input();

    info!(
        trigger_pin = pins.trigger,
        echo_pin = pins.echo,
        "GPIO pins acquired"
    );

    Ok(PulseTimer::new(trigger, echo, timing)?)
}
