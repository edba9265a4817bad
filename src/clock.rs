//! System tick counter.
//!
//! A periodic hardware timer calls [`TickClock::tick`] at the configured
//! tick frequency; everything else only reads.  The counter wraps at
//! `u32::MAX` (~49 days at 1 kHz), so durations are always computed with
//! [`elapsed`].

use core::sync::atomic::{AtomicU32, Ordering};

/// Monotonic tick counter shared between the timer context and the
/// foreground.
pub struct TickClock {
    ticks: AtomicU32,
}

impl TickClock {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance by one tick.  Timer context only.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Release);
    }

    /// Current tick count.
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

/// The clock driven by the 1 kHz system timer.
pub static SYSTEM_CLOCK: TickClock = TickClock::new();

/// Ticks elapsed from `since` to `now`, correct across a counter wrap.
#[inline]
pub fn elapsed(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}
