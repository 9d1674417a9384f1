//! Time source for battle timestamps.
use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock {
    fn now(&mut self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that moves forward a fixed step on every reading.
#[derive(Debug, Clone, Copy)]
pub struct SteppingClock {
    next: DateTime<Utc>,
    step: TimeDelta,
}

impl SteppingClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self { next: start, step }
    }

    /// Start at the Unix epoch, advancing `step_ms` milliseconds per reading.
    #[must_use]
    pub fn from_epoch(step_ms: i64) -> Self {
        Self::new(DateTime::<Utc>::default(), TimeDelta::milliseconds(step_ms))
    }
}

impl Clock for SteppingClock {
    fn now(&mut self) -> DateTime<Utc> {
        let now = self.next;
        self.next = now + self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_clock_advances_per_reading() {
        let mut clock = SteppingClock::from_epoch(250);
        let first = clock.now();
        let second = clock.now();
        assert_eq!((second - first).num_milliseconds(), 250);
        assert_eq!(first.timestamp(), 0);
    }
}
