//! One run of the measurement pipeline
//!
//! Sources are opened once per run; a run ends only on failure, and the
//! supervisor decides whether to start another.

use chrono::Utc;
use hydrosonde_core::config::HardwareConfig;
use hydrosonde_core::{
    CalibrationSource, Config, Error, LevelResult, ReadingSink, Result, StaticCalibration,
};
use hydrosonde_sensor::{level, DistanceSampler, EchoSource, ReadingAverager, SimulatedEcho};
use hydrosonde_store::ReadingStore;
use tracing::{info, warn};

fn open_store(config: &Config) -> Result<ReadingStore> {
    ReadingStore::open(&config.store.path).map_err(|err| Error::SinkFailure(err.to_string()))
}

/// Echo source for this run: simulated in debug mode, GPIO otherwise.
pub fn open_echo_source(hardware: &HardwareConfig) -> Result<Box<dyn EchoSource>> {
    if hardware.debug {
        warn!("Debug mode, distances are simulated");
        return Ok(Box::new(SimulatedEcho::new()));
    }

    let pins = hardware
        .pins()
        .map_err(|err| Error::InvalidConfiguration(err.to_string()))?;

    #[cfg(feature = "rpi")]
    {
        let timing = hydrosonde_sensor::PulseTiming::from(hardware);
        Ok(Box::new(hydrosonde_sensor::gpio::open_pulse_timer(pins, timing)?))
    }

    #[cfg(not(feature = "rpi"))]
    {
        let _ = pins;
        Err(Error::invalid_config(
            "built without GPIO support; enable the `rpi` feature or set hardware.debug",
        ))
    }
}

/// Calibration from the config file when present, otherwise from the store.
pub fn open_calibration(config: &Config) -> Result<Box<dyn CalibrationSource>> {
    match config.calibration {
        Some(calib) => Ok(Box::new(StaticCalibration(calib))),
        None => Ok(Box::new(open_store(config)?)),
    }
}

/// Collect one averaged reading, convert it with the current calibration and
/// hand it to the sink.
pub fn measure_once<S, C, K>(
    averager: &ReadingAverager,
    sampler: &mut DistanceSampler<S>,
    calibration: &mut C,
    sink: &mut K,
) -> Result<LevelResult>
where
    S: EchoSource,
    C: CalibrationSource + ?Sized,
    K: ReadingSink + ?Sized,
{
    let reading = averager.collect(sampler)?;
    let calib = calibration.load_calibration()?;
    let result = level::compute(reading.distance, &calib)?;
    sink.insert_reading(&result)?;

    info!(
        distance = reading.distance,
        height = result.height,
        percentage = result.percentage,
        "Reading stored"
    );
    Ok(result)
}

fn log_summary(store: &ReadingStore) {
    match store.summarize(Utc::now()) {
        Ok(Some(summary)) => info!(
            height = summary.height,
            percentage = summary.percentage,
            percentage_change_24h = ?summary.percentage_change_24h,
            height_change_3h = ?summary.height_change_3h,
            "Stored level"
        ),
        Ok(None) => info!("No readings stored yet"),
        Err(err) => warn!(error = %err, "Failed to summarize stored readings"),
    }
}

/// Measure forever. Returns only with the error that ended the run.
pub fn run(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    log_summary(&store);

    let mut calibration = open_calibration(config)?;
    let source = open_echo_source(&config.hardware)?;
    let mut sampler = DistanceSampler::new(source, config.sampling.speed_of_propagation);
    let averager = ReadingAverager::from_config(&config.sampling);

    loop {
        measure_once(&averager, &mut sampler, calibration.as_mut(), &mut store)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrosonde_core::CalibrationInfo;
    use std::path::PathBuf;

    struct FailingSink;

    impl ReadingSink for FailingSink {
        fn insert_reading(&mut self, _reading: &LevelResult) -> Result<()> {
            Err(Error::SinkFailure("disk full".into()))
        }
    }

    fn temp_db() -> PathBuf {
        std::env::temp_dir().join(format!("hydrosonde-node-{}.db", uuid::Uuid::new_v4()))
    }

    fn debug_config(db: PathBuf) -> Config {
        let mut config = Config::default();
        config.hardware.debug = true;
        config.hardware.trigger_pin = Some(23);
        config.hardware.echo_pin = Some(24);
        config.sampling.sample_count = 5;
        config.sampling.inter_sample_delay_ms = 0;
        config.store.path = db;
        config
    }

    #[test]
    fn test_measure_once_stores_reading() {
        let db = temp_db();
        let mut store = ReadingStore::open(&db).unwrap();
        let mut calibration = StaticCalibration(CalibrationInfo::new(0.52, 0.1, 0.01));
        let mut sampler = DistanceSampler::new(SimulatedEcho::seeded(9), 343.0);
        let averager = ReadingAverager::new(10, std::time::Duration::ZERO, 0.85);

        let result = measure_once(&averager, &mut sampler, &mut calibration, &mut store).unwrap();

        assert_eq!(store.reading_count().unwrap(), 1);
        assert_eq!(store.latest_reading().unwrap().unwrap().percentage, result.percentage);
        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_measure_once_propagates_sink_failure() {
        let mut calibration = StaticCalibration(CalibrationInfo::new(0.52, 0.1, 0.01));
        let mut sampler = DistanceSampler::new(SimulatedEcho::seeded(9), 343.0);
        let averager = ReadingAverager::new(3, std::time::Duration::ZERO, 0.85);

        let err = measure_once(&averager, &mut sampler, &mut calibration, &mut FailingSink)
            .unwrap_err();

        assert!(matches!(err, Error::SinkFailure(_)));
    }

    #[test]
    fn test_run_fails_without_calibration() {
        let db = temp_db();
        let config = debug_config(db.clone());

        let err = run(&config).unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(ReadingStore::open(&db).unwrap().reading_count().unwrap(), 0);
        let _ = std::fs::remove_file(db);
    }

    #[test]
    fn test_missing_pins_rejected_outside_debug() {
        let hardware = HardwareConfig::default();
        let err = open_echo_source(&hardware).err().unwrap();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_store_calibration_used_when_config_has_none() {
        let db = temp_db();
        ReadingStore::open(&db)
            .unwrap()
            .set_calibration(&CalibrationInfo::new(1.0, 0.2, 0.0))
            .unwrap();
        let config = debug_config(db.clone());

        let calib = open_calibration(&config).unwrap().load_calibration().unwrap();

        assert_eq!(calib.max_distance, 1.0);
        let _ = std::fs::remove_file(db);
    }
}
