//! Elapsed-time aware progress logging for a single run.
//!
//! A [`RunLog`] is created once when a run starts and handed to whatever
//! needs to report progress. Each step is emitted as a `tracing` event
//! carrying the seconds elapsed since the start.

use std::time::{Duration, Instant};

/// A source of elapsed time.
pub trait Clock {
    /// Time elapsed since the clock was started.
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Starts a new stopwatch.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for Stopwatch {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Progress logger for one run.
pub struct RunLog {
    clock: Box<dyn Clock>,
}

impl RunLog {
    /// Starts a run log backed by a [`Stopwatch`].
    #[must_use]
    pub fn start() -> Self {
        Self::with_clock(Stopwatch::start())
    }

    /// Creates a run log reading elapsed time from `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    /// Seconds since the start of the run, rounded to four decimal places.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        (self.clock.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0
    }

    /// Records a milestone of the run.
    pub fn step(&self, message: &str) {
        tracing::info!(elapsed = self.elapsed_secs(), "{message}");
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("elapsed", &self.clock.elapsed())
            .finish()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Duration);

    impl Clock for Fixed {
        fn elapsed(&self) -> Duration {
            self.0
        }
    }

    #[test]
    fn elapsed_is_rounded_to_four_places() {
        let log = RunLog::with_clock(Fixed(Duration::from_micros(1_234_567)));
        assert!((log.elapsed_secs() - 1.2346).abs() < f64::EPSILON);
    }

    #[test]
    fn stopwatch_moves_forward() {
        let watch = Stopwatch::start();
        let first = watch.elapsed();
        assert!(watch.elapsed() >= first);
    }
}
