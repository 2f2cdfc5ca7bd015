use std::time::{Duration, Instant};

/// A repeating timer checked from the UI loop. There is no catch-up: a late check fires
/// once and the next period starts from that check
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    last: Instant,
}

impl IntervalTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    /// True if the interval has passed since the last firing
    pub fn fire(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }

    /// Change the interval and restart the period
    pub fn reschedule(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.last = now;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time until the next firing, for scheduling repaints
    pub fn remaining(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last))
    }
}
