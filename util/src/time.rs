//! General time utility functions

use chrono;
use log::warn;
use std::thread;
use std::time::{Duration, Instant};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

// ---------------------------------------------------------------------------
// RATE LIMITING
// ---------------------------------------------------------------------------

/// Something which paces a cyclic loop.
pub trait Ticker {
    /// Block until the start of the next cycle.
    fn wait(&mut self);

    /// The nominal cycle period.
    fn period(&self) -> Duration;
}

/// A fixed-rate loop timer.
///
/// Each call to `wait` sleeps for whatever remains of the current cycle, so the loop runs at the
/// target rate regardless of how long the loop body took (as long as it doesn't overrun).
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    cycle_start: Instant,

    /// Number of consecutive cycles that have overrun the period
    pub num_consec_overruns: u64
}

impl Rate {
    /// Create a new rate at the given frequency in Hz.
    ///
    /// # Panics
    /// - If `freq_hz` is not strictly positive.
    pub fn new(freq_hz: f64) -> Self {
        assert!(freq_hz > 0.0, "Rate frequency must be positive, got {}", freq_hz);

        Self {
            period: Duration::from_secs_f64(1.0 / freq_hz),
            cycle_start: Instant::now(),
            num_consec_overruns: 0
        }
    }
}

impl Ticker for Rate {
    fn wait(&mut self) {
        let cycle_dur = Instant::now() - self.cycle_start;

        // Get sleep duration
        match self.period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - self.period.as_secs_f64()
                );
                self.num_consec_overruns += 1;
            }
        }

        self.cycle_start = Instant::now();
    }

    fn period(&self) -> Duration {
        self.period
    }
}

/// A ticker that never blocks, used when the robot is simulated in lockstep with the controller.
#[derive(Debug, Clone, Copy)]
pub struct NoWait {
    period: Duration
}

impl NoWait {
    pub fn new(freq_hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / freq_hz)
        }
    }
}

impl Ticker for NoWait {
    fn wait(&mut self) {}

    fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_rate_period() {
        let rate = Rate::new(20.0);
        assert_eq!(rate.period(), Duration::from_millis(50));
        assert_eq!(NoWait::new(10.0).period(), Duration::from_millis(100));
    }

    #[test]
    fn test_rate_paces_loop() {
        let mut rate = Rate::new(100.0);
        let start = Instant::now();
        for _ in 0..5 {
            rate.wait();
        }
        // Five 10 ms cycles, allowing generous slack for the scheduler
        assert!(Instant::now() - start >= Duration::from_millis(45));
    }
}
