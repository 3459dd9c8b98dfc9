//! Distance sampling with outlier rejection.
//!
//! Turns echo readings into distances and keeps asking the source until one
//! falls at or below the rejection ceiling. Timeouts and rejected samples are
//! absorbed here; only pin failures propagate.

use std::time::Duration;

use hydrosonde_core::{Error, Result};
use tracing::debug;

use crate::echo::{EchoReading, EchoSource, PulseError};

/// Speed of sound in air at roughly 20°C, metres per second.
pub const SPEED_OF_SOUND_M_PER_S: f64 = 343.0;

/// One-way distance for a round-trip echo time.
pub fn distance_from_elapsed(elapsed: Duration, speed_of_propagation: f64) -> f64 {
    elapsed.as_secs_f64() / 2.0 * speed_of_propagation
}

/// An accepted distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub distance: f64,
}

/// Running counters, for logging only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub accepted: u64,
    pub rejected: u64,
    pub timeouts: u64,
}

/// Pulls readings from an [`EchoSource`] until a plausible one arrives.
pub struct DistanceSampler<S> {
    source: S,
    speed_of_propagation: f64,
    stats: SamplerStats,
}

impl<S: EchoSource> DistanceSampler<S> {
    pub fn new(source: S, speed_of_propagation: f64) -> Self {
        Self {
            source,
            speed_of_propagation,
            stats: SamplerStats::default(),
        }
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Next distance at or below `reject_ceiling`.
    ///
    /// Retries on echo timeouts and on rejected samples without limit.
    pub fn next_valid_sample(&mut self, reject_ceiling: f64) -> Result<DistanceSample> {
        if !(reject_ceiling > 0.0) {
            return Err(Error::invalid_config(format!(
                "reject ceiling must be positive, got {}",
                reject_ceiling
            )));
        }

        loop {
            let distance = match self.source.next_echo() {
                Ok(EchoReading::Elapsed(elapsed)) => {
                    distance_from_elapsed(elapsed, self.speed_of_propagation)
                }
                Ok(EchoReading::Synthetic(distance)) => distance,
                Err(PulseError::Timeout { phase, .. }) => {
                    self.stats.timeouts += 1;
                    debug!(?phase, "Echo timed out, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            // NaN fails the comparison and is rejected too
            if !(distance <= reject_ceiling) {
                self.stats.rejected += 1;
                debug!(distance, reject_ceiling, "Sample above rejection ceiling, ignoring");
                continue;
            }

            self.stats.accepted += 1;
            return Ok(DistanceSample { distance });
        }
    }
}
