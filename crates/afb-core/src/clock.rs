//! Clocks
//!
//! Millisecond time sources. The engine never reads wall time directly so
//! tests can drive it with a [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Real monotonic time, counted from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Instant corresponding to a reading of this clock
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.origin + Duration::from_millis(ms)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Virtual clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u64) -> Self {
        Self { now: Rc::new(Cell::new(ms)) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    /// Jump to an absolute time; moving backwards is ignored
    pub fn set(&self, ms: u64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::starting_at(1_000);
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_ms(), 1_250);
        other.set(1_000);
        assert_eq!(clock.now_ms(), 1_250);
    }

    #[test]
    fn test_system_clock_instant() {
        let clock = SystemClock::new();
        let at = clock.instant_at(40);
        assert_eq!(at - clock.instant_at(0), Duration::from_millis(40));
        assert!(clock.now_ms() < 60_000);
    }
}
