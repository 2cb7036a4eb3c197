//! Monotonic millisecond clock

use std::time::Instant;

/// Monotonic millisecond tick that wraps at `u32::MAX`
pub trait MonotonicClock {
    fn now_ms(&self) -> u32;
}

/// Milliseconds since process start
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.start.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.now_ms().wrapping_sub(first) >= 5);
    }
}
