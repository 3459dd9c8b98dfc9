//! Hydrosonde Sensor
//!
//! Ultrasonic ranging for the water level sensor: pulse timing on a
//! trigger/echo pin pair, outlier rejection, averaging and conversion of the
//! averaged distance into a calibrated level.

pub mod averager;
pub mod echo;
#[cfg(feature = "rpi")]
pub mod gpio;
pub mod level;
pub mod pulse;
pub mod sampler;
pub mod simulate;

pub use averager::{AveragedReading, ReadingAverager};
pub use echo::{EchoPhase, EchoReading, EchoSource, PulseError};
pub use pulse::{PulseTimer, PulseTiming};
pub use sampler::{distance_from_elapsed, DistanceSample, DistanceSampler, SamplerStats};
pub use simulate::SimulatedEcho;
