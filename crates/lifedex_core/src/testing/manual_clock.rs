//! Clock that only moves when a test or simulation advances it.

use crate::clock::Clock;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    base_epoch_ms: i64,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new(base_epoch_ms: i64) -> Self {
        Self {
            base: Instant::now(),
            base_epoch_ms,
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed.get()
    }

    fn epoch_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.elapsed.get().as_millis()).unwrap_or(i64::MAX);
        self.base_epoch_ms.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};

    #[test]
    fn manual_clock_clones_advance_together() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        let start = clock.now();
        handle.advance_ms(250);
        assert_eq!(clock.epoch_ms(), 1_250);
        assert_eq!((clock.now() - start).as_millis(), 250);
    }
}
