//! Closed-loop speed controller.
//!
//! Targets are reached through acceleration-limited *ideal* speeds; two PID
//! loops (linear and angular) track the ideals against speeds measured from
//! encoder odometry, and their outputs are mixed into left/right motor
//! power.  The whole loop advances once per encoder poll.
//!
//! Angular speed is counter-clockwise positive: the right wheel is the
//! outer one for a positive turn.

use log::{debug, info};

use super::pid::PidController;
use crate::app::ports::{MotionPort, MotorPort};
use crate::config::RobotConfig;
use crate::sensors::SensorFrame;

/// Angular correction per raw count of side-sensor imbalance (rad/s).
const SIDE_WALL_GAIN: f32 = 0.002;

/// Wall-correction state.  Side correction only kicks in once a centred
/// reference has been recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallControl {
    pub side: bool,
    pub front: bool,
    /// `(side_left, side_right)` when centred between two walls.
    pub side_reference: Option<(u16, u16)>,
}

pub struct SpeedController<M: MotorPort> {
    motors: M,
    dt: f32,
    wheels_separation: f32,

    linear_acceleration: f32,
    linear_deceleration: f32,
    max_linear_speed: f32,
    angular_acceleration: f32,

    target_linear: f32,
    target_angular: f32,
    ideal_linear: f32,
    ideal_angular: f32,
    measured_linear: f32,
    measured_angular: f32,

    linear_pid: PidController,
    angular_pid: PidController,
    enabled: bool,

    walls: WallControl,
    frame: SensorFrame,
}

impl<M: MotorPort> SpeedController<M> {
    pub fn new(motors: M, config: &RobotConfig) -> Self {
        Self {
            motors,
            dt: config.tick_period_secs(),
            wheels_separation: config.wheels_separation,
            linear_acceleration: config.linear_acceleration,
            linear_deceleration: config.linear_deceleration,
            max_linear_speed: config.max_linear_speed,
            angular_acceleration: config.angular_acceleration,
            target_linear: 0.0,
            target_angular: 0.0,
            ideal_linear: 0.0,
            ideal_angular: 0.0,
            measured_linear: 0.0,
            measured_angular: 0.0,
            linear_pid: PidController::new(config.linear_gains),
            angular_pid: PidController::new(config.angular_gains),
            enabled: false,
            walls: WallControl::default(),
            frame: SensorFrame::default(),
        }
    }

    /// Re-read limits and gains after a config update.
    pub fn apply_config(&mut self, config: &RobotConfig) {
        self.dt = config.tick_period_secs();
        self.wheels_separation = config.wheels_separation;
        self.linear_acceleration = config.linear_acceleration;
        self.linear_deceleration = config.linear_deceleration;
        self.max_linear_speed = config.max_linear_speed;
        self.angular_acceleration = config.angular_acceleration;
        self.linear_pid.set_gains(config.linear_gains);
        self.angular_pid.set_gains(config.angular_gains);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn walls(&self) -> WallControl {
        self.walls
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    fn ramp_ideals(&mut self) {
        let linear_step = if self.ideal_linear < self.target_linear {
            self.linear_acceleration * self.dt
        } else {
            self.linear_deceleration * self.dt
        };
        self.ideal_linear = approach(self.ideal_linear, self.target_linear, linear_step);
        self.ideal_angular = approach(
            self.ideal_angular,
            self.target_angular,
            self.angular_acceleration * self.dt,
        );
    }

    fn side_correction(&self) -> f32 {
        match (self.walls.side, self.walls.side_reference) {
            (true, Some((ref_left, ref_right))) => {
                let offset = (i32::from(self.frame.side_left) - i32::from(ref_left))
                    - (i32::from(self.frame.side_right) - i32::from(ref_right));
                // Closer to the left wall: turn right.
                -SIDE_WALL_GAIN * offset as f32
            }
            _ => 0.0,
        }
    }

    fn drive(&mut self) {
        let linear = self
            .linear_pid
            .compute(self.ideal_linear, self.measured_linear, self.dt);
        let angular = self.angular_pid.compute(
            self.ideal_angular + self.side_correction(),
            self.measured_angular,
            self.dt,
        );
        let left = (linear - angular).clamp(-1.0, 1.0);
        let right = (linear + angular).clamp(-1.0, 1.0);
        self.motors.set_power(left, right);
    }
}

/// Move `current` towards `target` by at most `step`.
fn approach(current: f32, target: f32, step: f32) -> f32 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

impl<M: MotorPort> MotionPort for SpeedController<M> {
    fn enable_motor_control(&mut self) {
        self.linear_pid.reset();
        self.angular_pid.reset();
        self.enabled = true;
        debug!("Motion: control enabled");
    }

    fn disable_motor_control(&mut self) {
        self.enabled = false;
        self.motors.set_power(0.0, 0.0);
        debug!("Motion: control disabled");
    }

    fn side_sensors_control(&mut self, enabled: bool) {
        self.walls.side = enabled;
    }

    fn front_sensors_control(&mut self, enabled: bool) {
        self.walls.front = enabled;
    }

    fn side_sensors_calibration(&mut self) {
        self.walls.side_reference = Some((self.frame.side_left, self.frame.side_right));
        info!(
            "Motion: side reference L={} R={}",
            self.frame.side_left, self.frame.side_right
        );
    }

    fn set_target_linear_speed(&mut self, speed: f32) {
        self.target_linear = speed.clamp(-self.max_linear_speed, self.max_linear_speed);
    }

    fn set_target_angular_speed(&mut self, speed: f32) {
        self.target_angular = speed;
    }

    fn target_linear_speed(&self) -> f32 {
        self.target_linear
    }

    fn target_angular_speed(&self) -> f32 {
        self.target_angular
    }

    fn ideal_linear_speed(&self) -> f32 {
        self.ideal_linear
    }

    fn ideal_angular_speed(&self) -> f32 {
        self.ideal_angular
    }

    fn measured_linear_speed(&self) -> f32 {
        self.measured_linear
    }

    fn measured_angular_speed(&self) -> f32 {
        self.measured_angular
    }

    fn linear_acceleration(&self) -> f32 {
        self.linear_acceleration
    }

    fn set_linear_acceleration(&mut self, value: f32) {
        self.linear_acceleration = value;
    }

    fn linear_deceleration(&self) -> f32 {
        self.linear_deceleration
    }

    fn set_linear_deceleration(&mut self, value: f32) {
        self.linear_deceleration = value;
    }

    fn max_linear_speed(&self) -> f32 {
        self.max_linear_speed
    }

    fn set_max_linear_speed(&mut self, value: f32) {
        self.max_linear_speed = value;
    }

    fn reset_motion(&mut self) {
        self.enabled = false;
        self.target_linear = 0.0;
        self.target_angular = 0.0;
        self.ideal_linear = 0.0;
        self.ideal_angular = 0.0;
        self.measured_linear = 0.0;
        self.measured_angular = 0.0;
        self.linear_pid.reset();
        self.angular_pid.reset();
        self.motors.set_power(0.0, 0.0);
        debug!("Motion: reset");
    }

    fn reset_control_errors(&mut self) {
        self.linear_pid.reset();
        self.angular_pid.reset();
    }

    fn required_micrometers_to_speed(&self, speed: f32) -> f32 {
        let acceleration = if self.ideal_linear > speed {
            -self.linear_deceleration
        } else {
            self.linear_acceleration
        };
        if acceleration == 0.0 {
            return 0.0;
        }
        (speed * speed - self.ideal_linear * self.ideal_linear) / (2.0 * acceleration)
            * 1_000_000.0
    }

    fn on_odometry(&mut self, left_micrometers: i32, right_micrometers: i32) {
        let left = left_micrometers as f32 / 1_000_000.0;
        let right = right_micrometers as f32 / 1_000_000.0;
        self.measured_linear = (left + right) / 2.0 / self.dt;
        self.measured_angular = (right - left) / self.wheels_separation / self.dt;

        self.ramp_ideals();
        if self.enabled {
            self.drive();
        }
    }

    fn on_frame(&mut self, frame: &SensorFrame) {
        self.frame = *frame;
    }
}
