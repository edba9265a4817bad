//! Building blocks of a procedure: what each phase commands on entry, when
//! it ends, and what it logs while running.

use serde::{Deserialize, Serialize};

/// Linear speed setpoint, either literal or the controller's current limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearTarget {
    Speed(f32),
    /// Whatever `max_linear_speed` is when the command is applied.
    Max,
}

/// A single request to the motion controller.  Handlers queue these; the
/// service applies them in order after the state machine has run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionAction {
    EnableMotorControl,
    DisableMotorControl,
    SideSensorsControl(bool),
    FrontSensorsControl(bool),
    DisableWallsControl,
    SideSensorsCalibration,
    SetLinearSpeed(LinearTarget),
    SetAngularSpeed(f32),
    /// Also rebases the encoder distance tracker.
    ResetMotion,
    ResetControlErrors,
}

/// What a phase does to the speed targets when it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Keep,
    Speeds { linear: LinearTarget, angular: f32 },
    /// Cruise at max speed; [`Transition::RampComplete`] once `distance_um`
    /// has been covered.
    Accelerate { distance_um: i64 },
    /// Keep going until the braking point for `final_speed` at
    /// `distance_um`, then brake; complete when the ideal speed gets there.
    Decelerate { distance_um: i64, final_speed: f32 },
}

/// When a phase hands over to the next one.  Distances are measured from
/// the average wheel distance at phase entry, durations from the entry tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Immediate,
    Elapsed(u32),
    Travelled(i64),
    /// Travelled at least `distance - braking distance to zero`, with the
    /// braking distance taken once when the phase is entered.
    StoppingPoint(i64),
    /// The phase's ramp command finished.
    RampComplete,
}

/// Signal group written into a diagnostic sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    LinearSpeed,
    AngularSpeed,
    FrontSensors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every step of the scheduling loop.
    EveryPoll,
    Ticks(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCadence {
    pub cadence: Cadence,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub actions: &'static [MotionAction],
    pub command: Command,
    pub until: Transition,
    pub log: Option<LogCadence>,
}

impl Phase {
    pub const fn new(command: Command, until: Transition) -> Self {
        Self {
            actions: &[],
            command,
            until,
            log: None,
        }
    }

    pub const fn logging(mut self, cadence: Cadence, signal: Signal) -> Self {
        self.log = Some(LogCadence { cadence, signal });
        self
    }

    pub const fn with_actions(mut self, actions: &'static [MotionAction]) -> Self {
        self.actions = actions;
        self
    }
}
