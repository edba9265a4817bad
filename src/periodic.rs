//! Repeat-with-interval helpers.
//!
//! [`PeriodicTask`] is the non-blocking form polled from the scheduling
//! loop; [`each`] is the blocking form built on top of it.  Both fire once
//! immediately, then at every elapsed multiple of the interval, and stop
//! once the total duration has elapsed.  The last interval may be shorter
//! than the others.

use crate::app::ports::ClockPort;
use crate::clock::elapsed;

/// Outcome of polling a [`PeriodicTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Run the action now.
    Fire,
    /// Nothing to do for this many ticks.
    Wait(u32),
    /// The total duration has elapsed.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTask {
    start: u32,
    interval: u32,
    total: u32,
    /// Number of fires so far; the next one is due at `fired * interval`.
    fired: u32,
}

impl PeriodicTask {
    /// `interval` is clamped to at least one tick.
    pub fn new(start: u32, interval: u32, total: u32) -> Self {
        Self {
            start,
            interval: interval.max(1),
            total,
            fired: 0,
        }
    }

    /// A task that never finishes on its own.
    pub fn unbounded(start: u32, interval: u32) -> Self {
        Self::new(start, interval, u32::MAX)
    }

    pub fn fired(&self) -> u32 {
        self.fired
    }

    pub fn poll(&mut self, now: u32) -> Due {
        let elapsed = elapsed(self.start, now);
        if self.fired == 0 {
            self.fired = 1;
            return Due::Fire;
        }
        if elapsed >= self.total {
            return Due::Done;
        }
        let due_at = self.fired.saturating_mul(self.interval);
        if elapsed >= due_at {
            // Late callers skip the missed slots rather than bursting.
            self.fired = elapsed / self.interval + 1;
            Due::Fire
        } else {
            Due::Wait(due_at.min(self.total) - elapsed)
        }
    }
}

/// Run `action` every `interval` ticks for `total` ticks, blocking the
/// caller between fires.  The action receives the clock back so it can use
/// the other ports of a combined hardware handle.
pub fn each<C, F>(clock: &mut C, interval: u32, total: u32, mut action: F)
where
    C: ClockPort + ?Sized,
    F: FnMut(&mut C),
{
    let mut task = PeriodicTask::new(clock.ticks(), interval, total);
    loop {
        match task.poll(clock.ticks()) {
            Due::Fire => action(clock),
            Due::Wait(ticks) => clock.sleep_ticks(ticks),
            Due::Done => break,
        }
    }
}

/// Duration in ticks to sweep `angle` radians at `angular_speed` rad/s.
pub fn ticks_for_angle(angle: f32, angular_speed: f32, tick_frequency_hz: u32) -> u32 {
    (angle / angular_speed * tick_frequency_hz as f32).round() as u32
}
