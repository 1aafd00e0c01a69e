//! Wall-clock access and monotonic mutation stamps.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<i64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: Cell::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.set(self.now_ms.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.get()
    }
}

/// Issues `updatedAtMs` values that strictly increase.
///
/// Returns `max(now, last + 1)`, so two edits in the same millisecond (or a
/// clock stepping backwards) still order correctly.
#[derive(Debug, Default)]
pub struct Stamper {
    last_ms: Cell<i64>,
}

impl Stamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_ms: i64) -> i64 {
        let stamp = now_ms.max(self.last_ms.get() + 1);
        self.last_ms.set(stamp);
        stamp
    }

    /// Raises the floor so future stamps exceed an already observed value.
    pub fn observe(&self, seen_ms: i64) {
        if seen_ms > self.last_ms.get() {
            self.last_ms.set(seen_ms);
        }
    }
}
