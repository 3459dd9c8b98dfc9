//! Pipeline supervision
//!
//! Restarts the measurement pipeline after every failure until failures
//! within one window exceed the configured allowance.

use std::thread;
use std::time::{Duration, Instant};

use hydrosonde_core::config::SupervisorConfig;
use thiserror::Error;
use tracing::{error, info, warn};

/// Time source for the error budget.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("error budget exceeded: {failures} failures within {window:?} (allowed {allowed}), last error: {last_error}")]
    ErrorBudgetExceeded {
        failures: u32,
        allowed: u32,
        window: Duration,
        last_error: String,
    },
}

/// Failure counter over a fixed window.
///
/// The window restarts at the first failure observed after it has elapsed,
/// so failures never carry over from one window into the next.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    allowed: u32,
    window: Duration,
    window_start: Instant,
    failures: u32,
}

impl ErrorBudget {
    pub fn new(allowed: u32, window: Duration, now: Instant) -> Self {
        Self {
            allowed,
            window,
            window_start: now,
            failures: 0,
        }
    }

    /// Count a failure at `now`. Returns false once the allowance is exceeded.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.failures = 0;
        }
        self.failures += 1;
        self.failures <= self.allowed
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn allowed(&self) -> u32 {
        self.allowed
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Runs a pipeline, restarting it after failures.
pub struct Supervisor<C: Clock = SystemClock> {
    budget: ErrorBudget,
    backoff: Duration,
    clock: C,
    restarts: u64,
}

impl Supervisor<SystemClock> {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(config: &SupervisorConfig, clock: C) -> Self {
        let budget = ErrorBudget::new(config.allowed_errors_per_minute, config.window(), clock.now());
        Self {
            budget,
            backoff: config.backoff(),
            clock,
            restarts: 0,
        }
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Run `pipeline` until it returns `Ok` or the error budget runs out.
    pub fn run<F, E>(&mut self, mut pipeline: F) -> Result<(), SupervisorError>
    where
        F: FnMut() -> Result<(), E>,
        E: std::fmt::Display,
    {
        loop {
            let err = match pipeline() {
                Ok(()) => {
                    info!(restarts = self.restarts, "Pipeline stopped");
                    return Ok(());
                }
                Err(err) => err,
            };

            error!(error = %err, "Pipeline failed");

            if !self.budget.record_failure(self.clock.now()) {
                return Err(SupervisorError::ErrorBudgetExceeded {
                    failures: self.budget.failures(),
                    allowed: self.budget.allowed(),
                    window: self.budget.window(),
                    last_error: err.to_string(),
                });
            }

            self.restarts += 1;
            warn!(
                failures = self.budget.failures(),
                allowed = self.budget.allowed(),
                backoff_ms = self.backoff.as_millis() as u64,
                "Restarting pipeline"
            );
            if !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
        }
    }
}
