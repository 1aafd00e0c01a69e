//! Retry gate for the flusher.
//!
//! Consecutive failures wait `base, 2*base, 4*base, ...` capped at `max`.
//! A fully successful drain resets the sequence.

/// Exponential retry schedule in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    next_delay_ms: u64,
    next_attempt_at_ms: i64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            next_delay_ms: base_ms,
            next_attempt_at_ms: 0,
        }
    }

    /// Whether an attempt is allowed at `now_ms`.
    pub fn ready(&self, now_ms: i64) -> bool {
        now_ms >= self.next_attempt_at_ms
    }

    /// Schedules the next attempt after a failure and returns its delay.
    pub fn record_failure(&mut self, now_ms: i64) -> u64 {
        let delay = self.next_delay_ms.min(self.max_ms);
        self.next_attempt_at_ms = now_ms.saturating_add(delay as i64);
        self.next_delay_ms = self.next_delay_ms.saturating_mul(2).min(self.max_ms);
        delay
    }

    pub fn record_success(&mut self) {
        self.next_delay_ms = self.base_ms;
        self.next_attempt_at_ms = 0;
    }

    /// Delay the next failure would schedule.
    pub fn next_delay_ms(&self) -> u64 {
        self.next_delay_ms
    }

    pub fn next_attempt_at_ms(&self) -> i64 {
        self.next_attempt_at_ms
    }
}
