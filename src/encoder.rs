//! Wrap-aware encoder distance tracking.
//!
//! Each wheel encoder is a free-running 16-bit hardware counter.  Between
//! two polls the difference `(new - old) mod 2^16`, read as a signed 16-bit
//! value, is the true movement as long as the wheel travelled less than half
//! the counter range.  [`RobotConfig::validate`] checks that bound
//! statically; [`EncoderDistanceTracker::poll`] checks it at run time with a
//! configurable margin.
//!
//! Distances are kept as signed 64-bit counts and converted to micrometers
//! with a fixed-point nanometers-per-count constant, so accumulation never
//! drifts.

use serde::{Deserialize, Serialize};

use crate::app::ports::EncoderPort;
use crate::config::RobotConfig;
use crate::error::{Error, TimingViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wheel {
    Left,
    Right,
}

/// How the raw counter moves when the wheel rolls forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountDirection {
    Up,
    Down,
}

/// Signed movement between two raw counter readings.
#[inline]
pub fn wrapping_delta(old: u16, new: u16) -> i16 {
    new.wrapping_sub(old) as i16
}

// ---------------------------------------------------------------------------
// Single wheel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct WheelOdometer {
    direction: CountDirection,
    last_raw: u16,
    counts: i64,
    last_delta: i32,
}

impl WheelOdometer {
    pub fn new(raw: u16, direction: CountDirection) -> Self {
        Self {
            direction,
            last_raw: raw,
            counts: 0,
            last_delta: 0,
        }
    }

    /// Take `raw` as the new zero.
    pub fn rebase(&mut self, raw: u16) {
        self.last_raw = raw;
        self.counts = 0;
        self.last_delta = 0;
    }

    /// Accumulate the movement since the previous reading; returns the
    /// forward delta in counts.
    pub fn update(&mut self, raw: u16) -> i32 {
        let delta = i32::from(wrapping_delta(self.last_raw, raw));
        let delta = match self.direction {
            CountDirection::Up => delta,
            CountDirection::Down => -delta,
        };
        self.last_raw = raw;
        self.counts += i64::from(delta);
        self.last_delta = delta;
        delta
    }

    pub fn counts(&self) -> i64 {
        self.counts
    }

    pub fn last_delta(&self) -> i32 {
        self.last_delta
    }
}

// ---------------------------------------------------------------------------
// Both wheels
// ---------------------------------------------------------------------------

pub struct EncoderDistanceTracker {
    left: WheelOdometer,
    right: WheelOdometer,
    nanometers_per_count: i64,
    max_delta_counts: u16,
    max_observed_delta: u16,
}

impl EncoderDistanceTracker {
    /// Build a tracker whose baseline is the current counter values.
    pub fn new(config: &RobotConfig, encoders: &impl EncoderPort) -> Self {
        Self {
            left: WheelOdometer::new(encoders.left_count(), config.left_encoder_direction),
            right: WheelOdometer::new(encoders.right_count(), config.right_encoder_direction),
            nanometers_per_count: nanometers(config.micrometers_per_count),
            max_delta_counts: config.max_poll_delta_counts,
            max_observed_delta: 0,
        }
    }

    /// Re-read the counters as the new baseline and zero both wheels.
    pub fn reset(&mut self, encoders: &impl EncoderPort) {
        self.left.rebase(encoders.left_count());
        self.right.rebase(encoders.right_count());
        self.max_observed_delta = 0;
    }

    /// Read both counters and accumulate.  A delta beyond the configured
    /// margin is still applied (the baseline must keep moving) but is
    /// reported so the caller can abort.
    pub fn poll(&mut self, encoders: &impl EncoderPort) -> Result<(), Error> {
        let left = self.left.update(encoders.left_count());
        let right = self.right.update(encoders.right_count());

        let worst = left.unsigned_abs().max(right.unsigned_abs()) as u16;
        self.max_observed_delta = self.max_observed_delta.max(worst);

        for (wheel, counts) in [(Wheel::Left, left), (Wheel::Right, right)] {
            if counts.unsigned_abs() > u32::from(self.max_delta_counts) {
                return Err(TimingViolation::EncoderDelta {
                    wheel,
                    counts,
                    limit: self.max_delta_counts,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Apply a new calibration constant to every future distance query.
    pub fn set_micrometers_per_count(&mut self, micrometers_per_count: f32) {
        self.nanometers_per_count = nanometers(micrometers_per_count);
    }

    pub fn counts(&self, wheel: Wheel) -> i64 {
        match wheel {
            Wheel::Left => self.left.counts(),
            Wheel::Right => self.right.counts(),
        }
    }

    pub fn micrometers(&self, wheel: Wheel) -> i64 {
        self.counts(wheel) * self.nanometers_per_count / 1000
    }

    /// Mean distance of both wheels since the last reset (µm).
    pub fn average_micrometers(&self) -> i64 {
        (self.micrometers(Wheel::Left) + self.micrometers(Wheel::Right)) / 2
    }

    /// Wheel travel during the most recent poll (µm).
    pub fn last_delta_micrometers(&self) -> (i32, i32) {
        let scale = |delta: i32| (i64::from(delta) * self.nanometers_per_count / 1000) as i32;
        (scale(self.left.last_delta()), scale(self.right.last_delta()))
    }

    /// Largest per-poll delta magnitude since the last reset (counts).
    pub fn max_observed_delta(&self) -> u16 {
        self.max_observed_delta
    }
}

fn nanometers(micrometers_per_count: f32) -> i64 {
    (micrometers_per_count * 1000.0).round() as i64
}
