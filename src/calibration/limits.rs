//! Scoped overrides of the motion controller's linear limits.
//!
//! Calibration runs want gentler ramps than normal driving.  The override
//! is an RAII guard: the original values come back when it drops, whether
//! the run finished, returned an error or unwound.

use core::ops::{Deref, DerefMut};

use log::debug;

use crate::app::ports::MotionPort;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    pub linear_acceleration: f32,
    pub linear_deceleration: f32,
    pub max_linear_speed: f32,
}

impl MotionLimits {
    pub fn read(motion: &impl MotionPort) -> Self {
        Self {
            linear_acceleration: motion.linear_acceleration(),
            linear_deceleration: motion.linear_deceleration(),
            max_linear_speed: motion.max_linear_speed(),
        }
    }

    /// Limits as they will be once `patch` is applied.
    pub fn patched(self, patch: LimitsPatch) -> Self {
        Self {
            linear_acceleration: patch.linear_acceleration.unwrap_or(self.linear_acceleration),
            linear_deceleration: patch.linear_deceleration.unwrap_or(self.linear_deceleration),
            max_linear_speed: patch.max_linear_speed.unwrap_or(self.max_linear_speed),
        }
    }
}

/// Limits a procedure wants to change.  `None` leaves the field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimitsPatch {
    pub linear_acceleration: Option<f32>,
    pub linear_deceleration: Option<f32>,
    pub max_linear_speed: Option<f32>,
}

impl LimitsPatch {
    pub const NONE: Self = Self {
        linear_acceleration: None,
        linear_deceleration: None,
        max_linear_speed: None,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    fn write(&self, motion: &mut impl MotionPort) {
        if let Some(v) = self.linear_acceleration {
            motion.set_linear_acceleration(v);
        }
        if let Some(v) = self.linear_deceleration {
            motion.set_linear_deceleration(v);
        }
        if let Some(v) = self.max_linear_speed {
            motion.set_max_linear_speed(v);
        }
    }

    /// The patch that puts back the fields this one touches.
    fn undo(&self, saved: MotionLimits) -> Self {
        Self {
            linear_acceleration: self.linear_acceleration.map(|_| saved.linear_acceleration),
            linear_deceleration: self.linear_deceleration.map(|_| saved.linear_deceleration),
            max_linear_speed: self.max_linear_speed.map(|_| saved.max_linear_speed),
        }
    }
}

/// Exclusive access to the motion controller with `patch` in force.
pub struct LimitsOverride<'a, M: MotionPort> {
    motion: &'a mut M,
    restore: LimitsPatch,
}

impl<'a, M: MotionPort> LimitsOverride<'a, M> {
    pub fn apply(motion: &'a mut M, patch: LimitsPatch) -> Self {
        let restore = patch.undo(MotionLimits::read(&*motion));
        patch.write(motion);
        if !patch.is_empty() {
            debug!("Limits: override applied {:?}", patch);
        }
        Self { motion, restore }
    }
}

impl<M: MotionPort> Deref for LimitsOverride<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.motion
    }
}

impl<M: MotionPort> DerefMut for LimitsOverride<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.motion
    }
}

impl<M: MotionPort> Drop for LimitsOverride<'_, M> {
    fn drop(&mut self) {
        self.restore.write(self.motion);
        if !self.restore.is_empty() {
            debug!("Limits: restored {:?}", self.restore);
        }
    }
}
