//! Averaging of accepted distance samples into one reading.

use std::thread;
use std::time::Duration;

use hydrosonde_core::config::SamplingConfig;
use hydrosonde_core::{Error, Result};
use tracing::debug;

use crate::echo::EchoSource;
use crate::sampler::DistanceSampler;

/// Mean of exactly `samples` accepted distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedReading {
    pub distance: f64,
    pub samples: usize,
}

/// Collects a fixed number of accepted samples with a pause after each.
#[derive(Debug, Clone)]
pub struct ReadingAverager {
    sample_count: usize,
    inter_sample_delay: Duration,
    reject_ceiling: f64,
}

impl ReadingAverager {
    pub fn new(sample_count: usize, inter_sample_delay: Duration, reject_ceiling: f64) -> Self {
        Self {
            sample_count,
            inter_sample_delay,
            reject_ceiling,
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(
            config.sample_count,
            config.inter_sample_delay(),
            config.reject_ceiling,
        )
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Block until `sample_count` samples have been accepted and return their mean.
    ///
    /// Rejected samples and echo timeouts are retried by the sampler and do
    /// not count. A zero sample count is a configuration error.
    pub fn collect<S: EchoSource>(&self, sampler: &mut DistanceSampler<S>) -> Result<AveragedReading> {
        if self.sample_count == 0 {
            return Err(Error::invalid_config("sample count must be greater than zero"));
        }

        let before = sampler.stats();
        let mut total = 0.0;
        for _ in 0..self.sample_count {
            let sample = sampler.next_valid_sample(self.reject_ceiling)?;
            total += sample.distance;
            thread::sleep(self.inter_sample_delay);
        }

        let after = sampler.stats();
        let distance = total / self.sample_count as f64;
        debug!(
            distance,
            samples = self.sample_count,
            rejected = after.rejected - before.rejected,
            timeouts = after.timeouts - before.timeouts,
            "Averaged reading collected"
        );

        Ok(AveragedReading {
            distance,
            samples: self.sample_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::tests::ScriptedSource;
    use crate::sampler::SPEED_OF_SOUND_M_PER_S;

    #[test]
    fn test_mean_of_accepted_samples() {
        let source = ScriptedSource::distances(&[0.2, 0.4, 0.3, 0.5]);
        let mut sampler = DistanceSampler::new(source, SPEED_OF_SOUND_M_PER_S);
        let averager = ReadingAverager::new(4, Duration::ZERO, 0.85);

        let reading = averager.collect(&mut sampler).unwrap();

        assert!((reading.distance - 0.35).abs() < 1e-12);
        assert_eq!(reading.samples, 4);
    }

    #[test]
    fn test_rejected_samples_do_not_count() {
        let source = ScriptedSource::distances(&[0.2, 2.0, 0.9, 0.4, 5.0, 0.3, 0.5, 0.7]);
        let mut sampler = DistanceSampler::new(source, SPEED_OF_SOUND_M_PER_S);
        let averager = ReadingAverager::new(4, Duration::ZERO, 0.85);

        let reading = averager.collect(&mut sampler).unwrap();

        assert!((reading.distance - 0.35).abs() < 1e-12);
        assert_eq!(sampler.stats().accepted, 4);
        assert_eq!(sampler.stats().rejected, 3);
        // 0.7 is never consumed
        assert_eq!(sampler.source_mut().script.len(), 1);
    }

    #[test]
    fn test_zero_sample_count_is_invalid() {
        let source = ScriptedSource::distances(&[0.2]);
        let mut sampler = DistanceSampler::new(source, SPEED_OF_SOUND_M_PER_S);
        let averager = ReadingAverager::new(0, Duration::ZERO, 0.85);

        let err = averager.collect(&mut sampler).unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(sampler.source_mut().calls, 0);
    }

    #[test]
    fn test_hardware_failure_aborts_collection() {
        let source = ScriptedSource::distances(&[0.2, 0.3]);
        let mut sampler = DistanceSampler::new(source, SPEED_OF_SOUND_M_PER_S);
        let averager = ReadingAverager::new(5, Duration::ZERO, 0.85);

        let err = averager.collect(&mut sampler).unwrap_err();
        assert!(matches!(err, Error::Hardware(_)));
    }

    #[test]
    fn test_from_config() {
        let averager = ReadingAverager::from_config(&SamplingConfig::default());
        assert_eq!(averager.sample_count(), 1000);
    }
}
