//! Fixed-interval poll schedule.

use std::time::{Duration, Instant};

/// Tracks when the next poll cycle is due.
///
/// `Instant` is monotonic, so the interval math is immune to the tick
/// counter wrap that a raw millisecond counter would suffer.
#[derive(Debug)]
pub struct PollSchedule {
    interval: Duration,
    last_poll: Option<Instant>,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: None,
        }
    }

    /// Returns true when a poll cycle should run, advancing the schedule.
    ///
    /// The first call after construction always fires, so a freshly booted
    /// device learns about pending flags without waiting a full interval.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last_poll {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_poll = Some(now);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
