//! Echo sources: anything that can produce one ranging reading.
//!
//! The GPIO [`PulseTimer`](crate::pulse::PulseTimer) and the
//! [`SimulatedEcho`](crate::simulate::SimulatedEcho) generator are
//! interchangeable behind [`EchoSource`]; which one runs is decided when the
//! pipeline is built.

use std::time::Duration;
use thiserror::Error;

/// One ranging reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchoReading {
    /// Measured high time of the echo pin (round trip)
    Elapsed(Duration),
    /// Distance produced directly, without a pulse
    Synthetic(f64),
}

/// Which edge the timer was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPhase {
    Rising,
    Falling,
}

/// Errors from a single trigger/echo cycle.
#[derive(Debug, Error)]
pub enum PulseError {
    /// The echo did not complete within the phase timeout
    #[error("Echo timed out waiting for {phase:?} edge after {waited:?}")]
    Timeout { phase: EchoPhase, waited: Duration },

    /// Reading or driving a pin failed
    #[error("GPIO pin error: {0}")]
    Pin(String),
}

impl PulseError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PulseError::Timeout { .. })
    }
}

impl From<PulseError> for hydrosonde_core::Error {
    fn from(err: PulseError) -> Self {
        hydrosonde_core::Error::Hardware(err.to_string())
    }
}

/// Strategy producing ranging readings.
pub trait EchoSource {
    /// Run one measurement.
    fn next_echo(&mut self) -> Result<EchoReading, PulseError>;
}

impl<S: EchoSource + ?Sized> EchoSource for Box<S> {
    fn next_echo(&mut self) -> Result<EchoReading, PulseError> {
        (**self).next_echo()
    }
}
