//! Wraparound-safe interval timer over a 32-bit millisecond tick

/// A (last fired, interval) pair compared against a monotonic millisecond
/// counter. Elapsed time is `now.wrapping_sub(last_fired)`, so the counter
/// may roll over `u32::MAX` without misfiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    last_fired: u32,
    interval_ms: u32,
}

impl IntervalTimer {
    /// Timer armed at `now`; first expiry is one interval later
    pub fn new(interval_ms: u32, now: u32) -> Self {
        Self {
            last_fired: now,
            interval_ms,
        }
    }

    pub fn last_fired(&self) -> u32 {
        self.last_fired
    }

    /// Milliseconds since the timer last fired
    pub fn elapsed(&self, now: u32) -> u32 {
        now.wrapping_sub(self.last_fired)
    }

    pub fn is_due(&self, now: u32) -> bool {
        self.elapsed(now) >= self.interval_ms
    }

    /// Record a firing at `now`
    pub fn fire(&mut self, now: u32) {
        self.last_fired = now;
    }

    /// Fire and return true if a full interval has elapsed
    pub fn poll(&mut self, now: u32) -> bool {
        if self.is_due(now) {
            self.fire(now);
            true
        } else {
            false
        }
    }
}
