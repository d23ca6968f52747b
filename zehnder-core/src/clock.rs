//! Millisecond clock helpers
//!
//! The engine runs on a free-running `u32` millisecond counter supplied by
//! the host. The counter wraps after roughly 49.7 days, so every comparison
//! goes through elapsed-since arithmetic and never compares absolute values.

/// Milliseconds from the host's monotonic counter
pub type Millis = u32;

/// Milliseconds elapsed from `since` to `now`, across wraparound
pub fn elapsed(now: Millis, since: Millis) -> u32 {
    now.wrapping_sub(since)
}

/// One-shot timeout armed at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    started: Millis,
    duration_ms: u32,
}

impl Timeout {
    /// Arm a timeout of `duration_ms` starting at `now`
    pub const fn start(now: Millis, duration_ms: u32) -> Self {
        Self {
            started: now,
            duration_ms,
        }
    }

    /// Milliseconds since the timeout was armed
    pub fn elapsed(&self, now: Millis) -> u32 {
        elapsed(now, self.started)
    }

    /// Check if the full duration has passed
    pub fn is_expired(&self, now: Millis) -> bool {
        self.elapsed(now) >= self.duration_ms
    }
}
