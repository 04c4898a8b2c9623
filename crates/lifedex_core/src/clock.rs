//! Time sources for scheduling and entry timestamps.

use crate::integrity::now_epoch_ms;
use std::time::Instant;

pub trait Clock {
    /// Monotonic instant used for debounce deadlines.
    fn now(&self) -> Instant;
    /// Wall time in epoch milliseconds used for entry timestamps.
    fn epoch_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> i64 {
        now_epoch_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, SystemClock};

    #[test]
    fn system_clock_reports_positive_wall_time() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.epoch_ms() > 0);
        assert!(clock.now() >= first);
    }
}
