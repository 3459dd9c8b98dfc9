//! Synthetic echo source for running without a sensor attached.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::echo::{EchoReading, EchoSource, PulseError};

/// Distance band produced by [`SimulatedEcho::new`], in metres.
pub const DEFAULT_SIMULATED_RANGE: Range<f64> = 0.15..0.25;

/// Produces uniformly distributed distances instead of timing a pulse.
#[derive(Debug)]
pub struct SimulatedEcho {
    rng: StdRng,
    range: Range<f64>,
}

impl SimulatedEcho {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), DEFAULT_SIMULATED_RANGE)
    }

    /// Deterministic generator, for tests and reproducible dry runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), DEFAULT_SIMULATED_RANGE)
    }

    pub fn with_rng(rng: StdRng, range: Range<f64>) -> Self {
        Self { rng, range }
    }
}

impl Default for SimulatedEcho {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoSource for SimulatedEcho {
    fn next_echo(&mut self) -> Result<EchoReading, PulseError> {
        Ok(EchoReading::Synthetic(self.rng.gen_range(self.range.clone())))
    }
}
