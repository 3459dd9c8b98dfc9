//! HC-SR04 pulse timer
//!
//! Drives one trigger/echo cycle on a pin pair and times the echo's high
//! interval by busy-polling the input pin.
//!
//! # Phases
//! - **WAIT_RISING**: after the trigger, poll for the echo to go high. When the
//!   phase timeout passes without an edge the sensor is re-triggered and the
//!   wait starts over. There is no attempt limit.
//! - **WAIT_FALLING**: once high, poll for the echo to go low. A phase timeout
//!   here aborts the attempt with [`PulseError::Timeout`]; the caller decides
//!   whether to try again.
//!
//! The pins are owned for the lifetime of the timer. Dropping it drives the
//! trigger low; the GPIO backend releases the lines when the pins drop.

use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{InputPin, OutputPin};
use hydrosonde_core::config::HardwareConfig;
use tracing::{debug, info};

use crate::echo::{EchoPhase, EchoReading, EchoSource, PulseError};

/// Trigger width and per-phase waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    /// High time of the trigger pulse
    pub trigger_pulse: Duration,
    /// Maximum wait for each echo edge
    pub phase_timeout: Duration,
    /// Pause before re-triggering after a missed rising edge
    pub retrigger_delay: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            trigger_pulse: Duration::from_micros(100),
            phase_timeout: Duration::from_millis(500),
            retrigger_delay: Duration::from_millis(100),
        }
    }
}

impl From<&HardwareConfig> for PulseTiming {
    fn from(config: &HardwareConfig) -> Self {
        Self {
            trigger_pulse: config.trigger_pulse(),
            phase_timeout: config.phase_timeout(),
            retrigger_delay: config.retrigger_delay(),
        }
    }
}

/// Trigger/echo timer over a pair of `embedded-hal` pins.
pub struct PulseTimer<T: OutputPin, E: InputPin> {
    trigger: T,
    echo: E,
    timing: PulseTiming,
}

fn pin_error<P: embedded_hal::digital::Error>(err: P) -> PulseError {
    PulseError::Pin(format!("{:?}", err))
}

impl<T: OutputPin, E: InputPin> PulseTimer<T, E> {
    /// Take ownership of the pins and park the trigger low.
    pub fn new(mut trigger: T, echo: E, timing: PulseTiming) -> Result<Self, PulseError> {
        trigger.set_low().map_err(pin_error)?;
        Ok(Self {
            trigger,
            echo,
            timing,
        })
    }

    pub fn timing(&self) -> &PulseTiming {
        &self.timing
    }

    fn fire_trigger(&mut self) -> Result<(), PulseError> {
        self.trigger.set_high().map_err(pin_error)?;
        thread::sleep(self.timing.trigger_pulse);
        self.trigger.set_low().map_err(pin_error)
    }

    fn echo_high(&mut self) -> Result<bool, PulseError> {
        self.echo.is_high().map_err(pin_error)
    }

    /// Time one echo pulse.
    ///
    /// Blocks until a rising edge is seen (re-triggering every
    /// `timeout_per_phase`), then returns the high time, or
    /// [`PulseError::Timeout`] if the falling edge does not arrive within
    /// `timeout_per_phase`.
    pub fn measure_pulse(&mut self, timeout_per_phase: Duration) -> Result<Duration, PulseError> {
        self.fire_trigger()?;

        let mut phase_start = Instant::now();
        while !self.echo_high()? {
            if phase_start.elapsed() > timeout_per_phase {
                info!(
                    timeout_ms = timeout_per_phase.as_millis() as u64,
                    "No echo rising edge within time limit, re-triggering"
                );
                thread::sleep(self.timing.retrigger_delay);
                self.fire_trigger()?;
                phase_start = Instant::now();
            }
        }

        let start = Instant::now();
        while self.echo_high()? {
            if start.elapsed() > timeout_per_phase {
                debug!(
                    timeout_ms = timeout_per_phase.as_millis() as u64,
                    "Echo stayed high past time limit, aborting pulse"
                );
                return Err(PulseError::Timeout {
                    phase: EchoPhase::Falling,
                    waited: timeout_per_phase,
                });
            }
        }

        Ok(start.elapsed())
    }
}

impl<T: OutputPin, E: InputPin> EchoSource for PulseTimer<T, E> {
    fn next_echo(&mut self) -> Result<EchoReading, PulseError> {
        let timeout = self.timing.phase_timeout;
        self.measure_pulse(timeout).map(EchoReading::Elapsed)
    }
}

impl<T: OutputPin, E: InputPin> Drop for PulseTimer<T, E> {
    fn drop(&mut self) {
        let _ = self.trigger.set_low();
        debug!("Pulse timer released");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorKind, ErrorType};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Trigger pin counting rising edges.
    pub struct CountingTrigger {
        pub fired: Rc<Cell<u32>>,
        pub high: Rc<Cell<bool>>,
    }

    impl ErrorType for CountingTrigger {
        type Error = ErrorKind;
    }

    impl OutputPin for CountingTrigger {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.fired.set(self.fired.get() + 1);
            self.high.set(true);
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    pub enum EchoBehavior {
        /// Goes high on the answered trigger and stays high for the width
        Pulse(Duration),
        /// Goes high and never falls
        StuckHigh,
        /// Pin read fails
        Broken,
    }

    /// Echo pin that ignores the first `silent_triggers` triggers.
    pub struct ScriptedEcho {
        fired: Rc<Cell<u32>>,
        silent_triggers: u32,
        behavior: EchoBehavior,
        armed_for: u32,
        rose_at: Option<Instant>,
    }

    impl ErrorType for ScriptedEcho {
        type Error = ErrorKind;
    }

    impl InputPin for ScriptedEcho {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            let fired = self.fired.get();
            if let EchoBehavior::Broken = self.behavior {
                return Err(ErrorKind::Other);
            }
            if fired <= self.silent_triggers {
                return Ok(false);
            }
            if self.armed_for != fired {
                self.armed_for = fired;
                self.rose_at = Some(Instant::now());
            }
            match (self.behavior, self.rose_at) {
                (EchoBehavior::StuckHigh, _) => Ok(true),
                (EchoBehavior::Pulse(width), Some(rose_at)) => Ok(rose_at.elapsed() < width),
                _ => Ok(false),
            }
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    pub fn fast_timing(phase_timeout: Duration) -> PulseTiming {
        PulseTiming {
            trigger_pulse: Duration::ZERO,
            phase_timeout,
            retrigger_delay: Duration::ZERO,
        }
    }

    pub fn scripted_timer(
        silent_triggers: u32,
        behavior: EchoBehavior,
        timing: PulseTiming,
    ) -> (PulseTimer<CountingTrigger, ScriptedEcho>, Rc<Cell<u32>>, Rc<Cell<bool>>) {
        let fired = Rc::new(Cell::new(0));
        let high = Rc::new(Cell::new(true));
        let trigger = CountingTrigger {
            fired: fired.clone(),
            high: high.clone(),
        };
        let echo = ScriptedEcho {
            fired: fired.clone(),
            silent_triggers,
            behavior,
            armed_for: 0,
            rose_at: None,
        };
        let timer = PulseTimer::new(trigger, echo, timing).unwrap();
        (timer, fired, high)
    }

    #[test]
    fn test_new_parks_trigger_low() {
        let (_timer, fired, high) = scripted_timer(
            0,
            EchoBehavior::Pulse(Duration::from_millis(1)),
            fast_timing(Duration::from_millis(50)),
        );
        assert!(!high.get());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_measures_pulse_width() {
        let width = Duration::from_millis(3);
        let (mut timer, fired, _) = scripted_timer(
            0,
            EchoBehavior::Pulse(width),
            fast_timing(Duration::from_millis(200)),
        );

        let elapsed = timer.measure_pulse(Duration::from_millis(200)).unwrap();

        assert!(elapsed >= width - Duration::from_micros(500), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_rising_phase_retriggers_on_timeout() {
        let (mut timer, fired, _) = scripted_timer(
            3,
            EchoBehavior::Pulse(Duration::from_millis(1)),
            fast_timing(Duration::from_millis(2)),
        );

        assert!(timer.measure_pulse(Duration::from_millis(2)).is_ok());
        // initial trigger plus one per missed rising edge
        assert_eq!(fired.get(), 4);
    }

    #[test]
    fn test_rising_phase_has_no_attempt_limit() {
        let (mut timer, fired, _) = scripted_timer(
            60,
            EchoBehavior::Pulse(Duration::from_micros(200)),
            fast_timing(Duration::from_millis(1)),
        );

        assert!(timer.measure_pulse(Duration::from_millis(1)).is_ok());
        assert_eq!(fired.get(), 61);
    }

    #[test]
    fn test_falling_phase_timeout_aborts_without_retrigger() {
        let (mut timer, fired, _) = scripted_timer(
            0,
            EchoBehavior::StuckHigh,
            fast_timing(Duration::from_millis(5)),
        );

        let err = timer.measure_pulse(Duration::from_millis(5)).unwrap_err();

        assert!(matches!(
            err,
            PulseError::Timeout {
                phase: EchoPhase::Falling,
                ..
            }
        ));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_pin_failure_is_not_a_timeout() {
        let (mut timer, _, _) = scripted_timer(
            0,
            EchoBehavior::Broken,
            fast_timing(Duration::from_millis(5)),
        );

        let err = timer.measure_pulse(Duration::from_millis(5)).unwrap_err();
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_echo_source_uses_configured_timeout() {
        let (mut timer, _, _) = scripted_timer(
            0,
            EchoBehavior::Pulse(Duration::from_millis(1)),
            fast_timing(Duration::from_millis(100)),
        );

        match timer.next_echo().unwrap() {
            EchoReading::Elapsed(elapsed) => assert!(elapsed < Duration::from_millis(100)),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_drop_parks_trigger_low() {
        let (timer, _, high) = scripted_timer(
            0,
            EchoBehavior::Pulse(Duration::from_millis(1)),
            fast_timing(Duration::from_millis(50)),
        );
        high.set(true);
        drop(timer);
        assert!(!high.get());
    }

    #[test]
    fn test_timing_from_hardware_config() {
        let timing = PulseTiming::from(&HardwareConfig::default());
        assert_eq!(timing, PulseTiming::default());
    }
}
