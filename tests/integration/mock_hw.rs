//! Simulated robot for integration tests.
//!
//! [`SimRobot`] is a kinematic model: the wheels follow the ideal speeds
//! exactly, one tick late, and the encoders count the resulting travel.
//! A fresh rangefinder frame is published every tick, reading a wall ahead
//! of the start position.  Faults (frozen frames, encoder jumps) can be
//! injected at a given tick.

#![allow(dead_code)]

use std::cell::RefCell;

use mousecal::app::events::AppEvent;
use mousecal::app::ports::{
    ClockPort, ConfigError, ConfigPort, EncoderPort, EventSink, MotionPort, SensorPort,
};
use mousecal::config::RobotConfig;
use mousecal::sensors::SensorFrame;

/// Guard against a run that never finishes.
const TICK_LIMIT: u32 = 60_000;

/// Start distance to the wall ahead (m).
const WALL_AHEAD_M: f64 = 0.40;

/// Inverse of the default `d = 2.8 / ln(raw) - 0.23` transform.
fn raw_for_distance(meters: f64) -> u16 {
    let d = meters.max(0.0);
    (2.8 / (d + 0.23)).exp().clamp(2.0, 4095.0) as u16
}

fn approach(current: f32, target: f32, step: f32) -> f32 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

// ── SimRobot ──────────────────────────────────────────────────

pub struct SimRobot {
    pub tick: u32,
    dt: f32,
    micrometers_per_count: f64,
    half_separation: f64,

    // Motion state
    pub enabled: bool,
    pub side_control: bool,
    pub front_control: bool,
    pub side_calibrations: u32,
    pub resets: u32,
    pub error_resets: u32,
    target_linear: f32,
    target_angular: f32,
    ideal_linear: f32,
    ideal_angular: f32,
    measured_linear: f32,
    measured_angular: f32,
    linear_acceleration: f32,
    linear_deceleration: f32,
    max_linear_speed: f32,
    angular_acceleration: f32,
    /// Number of state-changing motion calls.
    pub motion_calls: u32,

    // Plant
    left_um: f64,
    right_um: f64,
    left_offset_counts: u16,
    pub sequence: u32,

    // Fault injection
    pub freeze_frames_at: Option<u32>,
    pub encoder_jump_at: Option<(u32, u16)>,
}

impl SimRobot {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            tick: 0,
            dt: config.tick_period_secs(),
            micrometers_per_count: f64::from(config.micrometers_per_count),
            half_separation: f64::from(config.wheels_separation) / 2.0,
            enabled: false,
            side_control: false,
            front_control: false,
            side_calibrations: 0,
            resets: 0,
            error_resets: 0,
            target_linear: 0.0,
            target_angular: 0.0,
            ideal_linear: 0.0,
            ideal_angular: 0.0,
            measured_linear: 0.0,
            measured_angular: 0.0,
            linear_acceleration: config.linear_acceleration,
            linear_deceleration: config.linear_deceleration,
            max_linear_speed: config.max_linear_speed,
            angular_acceleration: config.angular_acceleration,
            motion_calls: 0,
            left_um: 0.0,
            right_um: 0.0,
            left_offset_counts: 0,
            sequence: 0,
            freeze_frames_at: None,
            encoder_jump_at: None,
        }
    }

    /// Start the counters near the top of their range so runs cross the
    /// 16-bit wrap.
    pub fn near_wrap(mut self) -> Self {
        self.left_offset_counts = 65_000;
        self
    }

    /// Mean distance travelled since construction (µm).
    pub fn travelled_um(&self) -> f64 {
        (self.left_um + self.right_um) / 2.0
    }

    fn counts(&self, micrometers: f64) -> u16 {
        (micrometers / self.micrometers_per_count).round() as i64 as u16
    }

    fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        assert!(self.tick < TICK_LIMIT, "simulation ran past {TICK_LIMIT} ticks");

        if self.enabled {
            let dt = f64::from(self.dt);
            let linear = f64::from(self.ideal_linear) * dt * 1e6;
            let turn = f64::from(self.ideal_angular) * self.half_separation * dt * 1e6;
            self.left_um += linear - turn;
            self.right_um += linear + turn;
        }
        if let Some((at, jump)) = self.encoder_jump_at {
            if self.tick == at {
                self.left_offset_counts = self.left_offset_counts.wrapping_add(jump);
            }
        }
        let frozen = self.freeze_frames_at.is_some_and(|at| self.tick >= at);
        if !frozen {
            self.sequence = self.sequence.wrapping_add(1);
        }
    }
}

impl ClockPort for SimRobot {
    fn ticks(&self) -> u32 {
        self.tick
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.advance();
        }
    }
}

impl EncoderPort for SimRobot {
    fn left_count(&self) -> u16 {
        self.counts(self.left_um).wrapping_add(self.left_offset_counts)
    }

    fn right_count(&self) -> u16 {
        self.counts(self.right_um)
    }
}

impl SensorPort for SimRobot {
    fn frame(&self) -> SensorFrame {
        let ahead = WALL_AHEAD_M - self.travelled_um() / 1e6;
        let front = raw_for_distance(ahead);
        SensorFrame {
            side_left: 900,
            side_right: 880,
            front_left: front,
            front_right: front.saturating_sub(5),
            sequence: self.sequence,
        }
    }
}

impl MotionPort for SimRobot {
    fn enable_motor_control(&mut self) {
        self.motion_calls += 1;
        self.enabled = true;
    }

    fn disable_motor_control(&mut self) {
        self.motion_calls += 1;
        self.enabled = false;
    }

    fn side_sensors_control(&mut self, enabled: bool) {
        self.motion_calls += 1;
        self.side_control = enabled;
    }

    fn front_sensors_control(&mut self, enabled: bool) {
        self.motion_calls += 1;
        self.front_control = enabled;
    }

    fn side_sensors_calibration(&mut self) {
        self.motion_calls += 1;
        self.side_calibrations += 1;
    }

    fn set_target_linear_speed(&mut self, speed: f32) {
        self.motion_calls += 1;
        self.target_linear = speed.clamp(-self.max_linear_speed, self.max_linear_speed);
    }

    fn set_target_angular_speed(&mut self, speed: f32) {
        self.motion_calls += 1;
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
        self.motion_calls += 1;
        self.linear_acceleration = value;
    }

    fn linear_deceleration(&self) -> f32 {
        self.linear_deceleration
    }

    fn set_linear_deceleration(&mut self, value: f32) {
        self.motion_calls += 1;
        self.linear_deceleration = value;
    }

    fn max_linear_speed(&self) -> f32 {
        self.max_linear_speed
    }

    fn set_max_linear_speed(&mut self, value: f32) {
        self.motion_calls += 1;
        self.max_linear_speed = value;
    }

    fn reset_motion(&mut self) {
        self.motion_calls += 1;
        self.resets += 1;
        self.enabled = false;
        self.target_linear = 0.0;
        self.target_angular = 0.0;
        self.ideal_linear = 0.0;
        self.ideal_angular = 0.0;
    }

    fn reset_control_errors(&mut self) {
        self.motion_calls += 1;
        self.error_resets += 1;
    }

    fn required_micrometers_to_speed(&self, speed: f32) -> f32 {
        let acceleration = if self.ideal_linear > speed {
            -self.linear_deceleration
        } else {
            self.linear_acceleration
        };
        (speed * speed - self.ideal_linear * self.ideal_linear) / (2.0 * acceleration) * 1e6
    }

    fn on_odometry(&mut self, left_micrometers: i32, right_micrometers: i32) {
        let left = left_micrometers as f32 / 1e6;
        let right = right_micrometers as f32 / 1e6;
        self.measured_linear = (left + right) / 2.0 / self.dt;
        self.measured_angular = (right - left) / (2.0 * self.half_separation as f32) / self.dt;

        let linear_step = if self.ideal_linear < self.target_linear {
            self.linear_acceleration
        } else {
            self.linear_deceleration
        } * self.dt;
        self.ideal_linear = approach(self.ideal_linear, self.target_linear, linear_step);
        self.ideal_angular = approach(
            self.ideal_angular,
            self.target_angular,
            self.angular_acceleration * self.dt,
        );
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> impl Iterator<Item = &mousecal::app::events::DiagnosticRecord> {
        self.events.iter().filter_map(|e| match e {
            AppEvent::Sample(record) => Some(record),
            _ => None,
        })
    }

    pub fn phase_changes(&self) -> Vec<(mousecal::fsm::StateId, mousecal::fsm::StateId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::PhaseChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub stored: RefCell<Option<RobotConfig>>,
}

impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<RobotConfig, ConfigError> {
        self.stored.borrow().clone().ok_or(ConfigError::NotFound)
    }

    fn save(&self, config: &RobotConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }
}
