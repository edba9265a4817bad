//! Calibration procedures.
//!
//! Each procedure is a [`ProcedurePlan`]: a fixed sequence of optional
//! phases run by the [`Sequencer`](crate::fsm::Sequencer), plus the motion
//! actions to issue around it and the limits to override while it runs.
//!
//! | Procedure            | Baseline | RampUp            | Hold                  | RampDown        | Settle        |
//! |----------------------|----------|-------------------|-----------------------|-----------------|---------------|
//! | Linear profile       | 1000/10  | max speed         | 500 mm, log 1/tick    | stop            | 2000, 1/tick  |
//! | Angular profile      | 1000/10  | 4π rad/s          | 3π rad (750), log /10 | stop            | 2000, /10     |
//! | Static 90° turn      | 1000/10  | 4π rad/s          | π/2 rad (125), /10    | stop            | 200, /10      |
//! | µm per count         | —        | accelerate N cells| —                     | decelerate 1 cell | —           |
//! | Front sensors        | —        | 0.3 m/s           | 1.3 cells to stop     | stop            | 200, /2       |

pub mod limits;
pub mod phase;

use core::f32::consts::PI;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RobotConfig;
use crate::error::Error;
use crate::fsm::StateId;
use crate::periodic::ticks_for_angle;

pub use limits::{LimitsOverride, LimitsPatch, MotionLimits};
pub use phase::{
    Cadence, Command, LinearTarget, LogCadence, MotionAction, Phase, Signal, Transition,
};

// ── Procedure constants ──────────────────────────────────────

pub const BASELINE_TICKS: u32 = 1000;
pub const BASELINE_LOG_INTERVAL: u32 = 10;

pub const LINEAR_PROFILE_DISTANCE_UM: i64 = 500_000;
pub const LINEAR_SETTLE_TICKS: u32 = 2000;

pub const ANGULAR_PROFILE_ANGLE: f32 = 3.0 * PI;
pub const ANGULAR_SETTLE_TICKS: u32 = 2000;
pub const ANGULAR_LOG_INTERVAL: u32 = 10;

pub const STATIC_TURN_ANGLE: f32 = PI / 2.0;
pub const STATIC_TURN_SETTLE_TICKS: u32 = 200;

pub const FRONT_CALIBRATION_CELLS: f32 = 1.3;
pub const FRONT_SETTLE_TICKS: u32 = 200;
pub const FRONT_SETTLE_LOG_INTERVAL: u32 = 2;

pub const CALIBRATION_ACCELERATION: f32 = 4.0;
pub const CALIBRATION_DECELERATION: f32 = 4.0;
pub const CALIBRATION_MAX_SPEED: f32 = 0.4;

// ── Procedure identity ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureId {
    LinearSpeedProfile,
    AngularSpeedProfile,
    StaticTurnRight,
    MicrometersPerCount { cells: u8 },
    FrontSensors,
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearSpeedProfile => write!(f, "linear_speed_profile"),
            Self::AngularSpeedProfile => write!(f, "angular_speed_profile"),
            Self::StaticTurnRight => write!(f, "static_turn_right"),
            Self::MicrometersPerCount { cells } => {
                write!(f, "micrometers_per_count({cells})")
            }
            Self::FrontSensors => write!(f, "front_sensors_calibration"),
        }
    }
}

// ── Plan ─────────────────────────────────────────────────────

const STOP: Phase = Phase::new(
    Command::Speeds {
        linear: LinearTarget::Speed(0.0),
        angular: 0.0,
    },
    Transition::Immediate,
);

const OPEN_LOOP_ENTRY: &[MotionAction] = &[
    MotionAction::DisableWallsControl,
    MotionAction::EnableMotorControl,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcedurePlan {
    pub procedure: ProcedureId,
    /// Issued when the run leaves Idle.
    pub entry: &'static [MotionAction],
    /// Issued when the run returns to Idle, before `ResetMotion`.
    pub exit: &'static [MotionAction],
    pub limits: LimitsPatch,
    pub baseline: Option<Phase>,
    pub ramp_up: Phase,
    pub hold: Option<Phase>,
    pub ramp_down: Phase,
    pub settle: Option<Phase>,
}

impl ProcedurePlan {
    /// Validate parameters and lay out the phases.  `current` are the
    /// controller's limits before any override.
    pub fn build(
        procedure: ProcedureId,
        config: &RobotConfig,
        current: MotionLimits,
    ) -> Result<Self, Error> {
        if config.tick_frequency_hz == 0 {
            return Err(Error::Config("tick frequency must be > 0"));
        }
        match procedure {
            ProcedureId::LinearSpeedProfile => Self::linear_profile(current),
            ProcedureId::AngularSpeedProfile => Self::turn_profile(
                procedure,
                config,
                ANGULAR_PROFILE_ANGLE,
                ANGULAR_SETTLE_TICKS,
            ),
            ProcedureId::StaticTurnRight => Self::turn_profile(
                procedure,
                config,
                STATIC_TURN_ANGLE,
                STATIC_TURN_SETTLE_TICKS,
            ),
            ProcedureId::MicrometersPerCount { cells } => {
                Self::micrometers_per_count(cells, config)
            }
            ProcedureId::FrontSensors => Self::front_sensors(config, current),
        }
    }

    fn linear_profile(current: MotionLimits) -> Result<Self, Error> {
        if !(current.max_linear_speed > 0.0) {
            return Err(Error::Config("linear profile needs max linear speed > 0"));
        }
        Ok(Self {
            procedure: ProcedureId::LinearSpeedProfile,
            entry: OPEN_LOOP_ENTRY,
            exit: &[],
            limits: LimitsPatch::NONE,
            baseline: Some(baseline(Signal::LinearSpeed)),
            ramp_up: Phase::new(
                Command::Speeds {
                    linear: LinearTarget::Max,
                    angular: 0.0,
                },
                Transition::Immediate,
            ),
            hold: Some(
                Phase::new(
                    Command::Keep,
                    Transition::Travelled(LINEAR_PROFILE_DISTANCE_UM),
                )
                .logging(Cadence::Ticks(1), Signal::LinearSpeed),
            ),
            ramp_down: STOP,
            settle: Some(
                Phase::new(Command::Keep, Transition::Elapsed(LINEAR_SETTLE_TICKS))
                    .logging(Cadence::Ticks(1), Signal::LinearSpeed),
            ),
        })
    }

    fn turn_profile(
        procedure: ProcedureId,
        config: &RobotConfig,
        angle: f32,
        settle_ticks: u32,
    ) -> Result<Self, Error> {
        let speed = config.profile_angular_speed;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(Error::Config("angular profile needs angular speed > 0"));
        }
        let hold_ticks = ticks_for_angle(angle, speed, config.tick_frequency_hz);
        let log = |phase: Phase| {
            phase.logging(Cadence::Ticks(ANGULAR_LOG_INTERVAL), Signal::AngularSpeed)
        };
        Ok(Self {
            procedure,
            entry: OPEN_LOOP_ENTRY,
            exit: &[],
            limits: LimitsPatch::NONE,
            baseline: Some(baseline(Signal::AngularSpeed)),
            ramp_up: Phase::new(
                Command::Speeds {
                    linear: LinearTarget::Speed(0.0),
                    angular: speed,
                },
                Transition::Immediate,
            ),
            hold: Some(log(Phase::new(Command::Keep, Transition::Elapsed(hold_ticks)))),
            ramp_down: STOP,
            settle: Some(log(Phase::new(Command::Keep, Transition::Elapsed(settle_ticks)))),
        })
    }

    fn micrometers_per_count(cells: u8, config: &RobotConfig) -> Result<Self, Error> {
        if cells == 0 {
            return Err(Error::Config("micrometers-per-count run needs at least one cell"));
        }
        let accelerate_m = config.cell_dimension * f32::from(cells)
            - config.wall_width / 2.0
            - config.mouse_tail;
        let decelerate_m = config.cell_dimension - config.wall_width / 2.0 - config.mouse_head;
        if !(accelerate_m > 0.0 && decelerate_m > 0.0) {
            return Err(Error::Config("cell geometry leaves no room to travel"));
        }
        Ok(Self {
            procedure: ProcedureId::MicrometersPerCount { cells },
            entry: &[
                MotionAction::ResetMotion,
                MotionAction::SideSensorsCalibration,
                MotionAction::EnableMotorControl,
                MotionAction::SideSensorsControl(true),
                MotionAction::FrontSensorsControl(false),
            ],
            exit: &[MotionAction::ResetControlErrors],
            limits: LimitsPatch {
                linear_acceleration: Some(CALIBRATION_ACCELERATION),
                linear_deceleration: Some(CALIBRATION_DECELERATION),
                max_linear_speed: Some(CALIBRATION_MAX_SPEED),
            },
            baseline: None,
            ramp_up: Phase::new(
                Command::Accelerate {
                    distance_um: to_micrometers(accelerate_m),
                },
                Transition::RampComplete,
            ),
            hold: None,
            ramp_down: Phase::new(
                Command::Decelerate {
                    distance_um: to_micrometers(decelerate_m),
                    final_speed: 0.0,
                },
                Transition::RampComplete,
            )
            .with_actions(&[MotionAction::DisableWallsControl]),
            settle: None,
        })
    }

    fn front_sensors(config: &RobotConfig, current: MotionLimits) -> Result<Self, Error> {
        let speed = config.front_calibration_speed;
        if !(speed > 0.0 && speed <= current.max_linear_speed) {
            return Err(Error::Config(
                "front calibration speed must be > 0 and within max linear speed",
            ));
        }
        Ok(Self {
            procedure: ProcedureId::FrontSensors,
            entry: OPEN_LOOP_ENTRY,
            exit: &[],
            limits: LimitsPatch {
                linear_acceleration: Some(CALIBRATION_ACCELERATION),
                ..LimitsPatch::NONE
            },
            baseline: None,
            ramp_up: Phase::new(
                Command::Speeds {
                    linear: LinearTarget::Speed(speed),
                    angular: 0.0,
                },
                Transition::Immediate,
            ),
            hold: Some(
                Phase::new(
                    Command::Keep,
                    Transition::StoppingPoint(to_micrometers(
                        FRONT_CALIBRATION_CELLS * config.cell_dimension,
                    )),
                )
                .logging(Cadence::EveryPoll, Signal::FrontSensors),
            ),
            ramp_down: STOP,
            settle: Some(
                Phase::new(Command::Keep, Transition::Elapsed(FRONT_SETTLE_TICKS))
                    .logging(Cadence::Ticks(FRONT_SETTLE_LOG_INTERVAL), Signal::FrontSensors),
            ),
        })
    }

    /// The phase run in `state`, if this plan has one.
    pub fn phase(&self, state: StateId) -> Option<&Phase> {
        match state {
            StateId::Idle => None,
            StateId::Baseline => self.baseline.as_ref(),
            StateId::RampUp => Some(&self.ramp_up),
            StateId::Hold => self.hold.as_ref(),
            StateId::RampDown => Some(&self.ramp_down),
            StateId::Settle => self.settle.as_ref(),
        }
    }

    /// First phase after leaving Idle.
    pub fn first_state(&self) -> StateId {
        self.next_after(StateId::Idle)
    }

    /// Phase that follows `state`; Idle once the plan is exhausted.
    pub fn next_after(&self, state: StateId) -> StateId {
        let from = StateId::RUN_ORDER
            .iter()
            .position(|s| *s == state)
            .map_or(0, |i| i + 1);
        StateId::RUN_ORDER[from..]
            .iter()
            .copied()
            .find(|s| self.phase(*s).is_some())
            .unwrap_or(StateId::Idle)
    }

    /// True if any phase logs rangefinder data, so stalled frames matter.
    pub fn needs_sensors(&self) -> bool {
        StateId::RUN_ORDER.iter().any(|s| {
            self.phase(*s)
                .and_then(|p| p.log)
                .is_some_and(|log| log.signal == Signal::FrontSensors)
        })
    }

    /// Speed the ramp-down phase brakes to.
    pub fn final_speed(&self) -> f32 {
        match self.ramp_down.command {
            Command::Decelerate { final_speed, .. } => final_speed,
            _ => 0.0,
        }
    }
}

fn baseline(signal: Signal) -> Phase {
    Phase::new(Command::Keep, Transition::Elapsed(BASELINE_TICKS))
        .logging(Cadence::Ticks(BASELINE_LOG_INTERVAL), signal)
}

fn to_micrometers(meters: f32) -> i64 {
    (f64::from(meters) * 1_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MotionLimits {
        let c = RobotConfig::default();
        MotionLimits {
            linear_acceleration: c.linear_acceleration,
            linear_deceleration: c.linear_deceleration,
            max_linear_speed: c.max_linear_speed,
        }
    }

    fn plan(id: ProcedureId) -> ProcedurePlan {
        ProcedurePlan::build(id, &RobotConfig::default(), limits()).unwrap()
    }

    #[test]
    fn linear_profile_phase_order() {
        let p = plan(ProcedureId::LinearSpeedProfile);
        assert_eq!(p.first_state(), StateId::Baseline);
        assert_eq!(p.next_after(StateId::Baseline), StateId::RampUp);
        assert_eq!(p.next_after(StateId::RampUp), StateId::Hold);
        assert_eq!(p.next_after(StateId::Hold), StateId::RampDown);
        assert_eq!(p.next_after(StateId::RampDown), StateId::Settle);
        assert_eq!(p.next_after(StateId::Settle), StateId::Idle);
        assert!(!p.needs_sensors());
    }

    #[test]
    fn micrometers_per_count_skips_optional_phases() {
        let p = plan(ProcedureId::MicrometersPerCount { cells: 3 });
        assert_eq!(p.first_state(), StateId::RampUp);
        assert_eq!(p.next_after(StateId::RampUp), StateId::RampDown);
        assert_eq!(p.next_after(StateId::RampDown), StateId::Idle);
        // 3 * 180 mm - 6 mm - 31 mm
        assert_eq!(
            p.ramp_up.command,
            Command::Accelerate {
                distance_um: 503_000
            }
        );
        assert_eq!(p.limits.max_linear_speed, Some(CALIBRATION_MAX_SPEED));
    }

    #[test]
    fn turn_durations_derive_from_angle() {
        let p = plan(ProcedureId::AngularSpeedProfile);
        assert_eq!(p.hold.unwrap().until, Transition::Elapsed(750));
        let p = plan(ProcedureId::StaticTurnRight);
        assert_eq!(p.hold.unwrap().until, Transition::Elapsed(125));
        assert_eq!(p.settle.unwrap().until, Transition::Elapsed(200));
    }

    #[test]
    fn front_calibration_targets_1_3_cells() {
        let p = plan(ProcedureId::FrontSensors);
        assert_eq!(p.hold.unwrap().until, Transition::StoppingPoint(234_000));
        assert!(p.needs_sensors());
    }

    #[test]
    fn zero_angular_speed_is_rejected() {
        let config = RobotConfig {
            profile_angular_speed: 0.0,
            ..RobotConfig::default()
        };
        let err = ProcedurePlan::build(ProcedureId::StaticTurnRight, &config, limits());
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn zero_max_speed_is_rejected() {
        let stopped = MotionLimits {
            max_linear_speed: 0.0,
            ..limits()
        };
        let err = ProcedurePlan::build(
            ProcedureId::LinearSpeedProfile,
            &RobotConfig::default(),
            stopped,
        );
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn zero_cells_is_rejected() {
        let err = ProcedurePlan::build(
            ProcedureId::MicrometersPerCount { cells: 0 },
            &RobotConfig::default(),
            limits(),
        );
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
