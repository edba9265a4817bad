//! Hardware adapter — bridges the robot's peripherals to domain port traits.
//!
//! [`Robot`] owns the encoder counters, the speed controller (and through
//! it the motors) and the tick source, and reads the rangefinder pipeline
//! shared with the sweep interrupt.  It implements every port a procedure
//! needs, so the service can drive it through one `&mut`.

use crate::app::ports::{ClockPort, EncoderPort, MotionPort, MotorPort, SensorPort};
use crate::config::RobotConfig;
use crate::control::SpeedController;
use crate::sensors::{SensorFrame, SensorPipeline};

/// Concrete adapter that combines all hardware behind port traits.
pub struct Robot<E: EncoderPort, M: MotorPort, C: ClockPort> {
    encoders: E,
    sensors: &'static SensorPipeline,
    motion: SpeedController<M>,
    clock: C,
}

impl<E: EncoderPort, M: MotorPort, C: ClockPort> Robot<E, M, C> {
    pub fn new(
        encoders: E,
        sensors: &'static SensorPipeline,
        motion: SpeedController<M>,
        clock: C,
    ) -> Self {
        Self {
            encoders,
            sensors,
            motion,
            clock,
        }
    }

    pub fn motion(&self) -> &SpeedController<M> {
        &self.motion
    }

    pub fn encoders_mut(&mut self) -> &mut E {
        &mut self.encoders
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Push controller gains and geometry from an adopted config.  Limits
    /// travel through [`MotionPort`]; gains do not.
    pub fn apply_config(&mut self, config: &RobotConfig) {
        self.motion.apply_config(config);
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl<E: EncoderPort, M: MotorPort, C: ClockPort> ClockPort for Robot<E, M, C> {
    fn ticks(&self) -> u32 {
        self.clock.ticks()
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        self.clock.sleep_ticks(ticks);
    }
}

// ── EncoderPort ───────────────────────────────────────────────

impl<E: EncoderPort, M: MotorPort, C: ClockPort> EncoderPort for Robot<E, M, C> {
    fn left_count(&self) -> u16 {
        self.encoders.left_count()
    }

    fn right_count(&self) -> u16 {
        self.encoders.right_count()
    }
}

// ── SensorPort ────────────────────────────────────────────────

impl<E: EncoderPort, M: MotorPort, C: ClockPort> SensorPort for Robot<E, M, C> {
    fn frame(&self) -> SensorFrame {
        self.sensors.snapshot()
    }
}

// ── MotionPort (delegates to the speed controller) ────────────

impl<E: EncoderPort, M: MotorPort, C: ClockPort> MotionPort for Robot<E, M, C> {
    fn enable_motor_control(&mut self) {
        self.motion.enable_motor_control();
    }

    fn disable_motor_control(&mut self) {
        self.motion.disable_motor_control();
    }

    fn side_sensors_control(&mut self, enabled: bool) {
        self.motion.side_sensors_control(enabled);
    }

    fn front_sensors_control(&mut self, enabled: bool) {
        self.motion.front_sensors_control(enabled);
    }

    fn side_sensors_calibration(&mut self) {
        // Calibrate against the freshest sweep, not the last loop's copy.
        let frame = self.sensors.snapshot();
        self.motion.on_frame(&frame);
        self.motion.side_sensors_calibration();
    }

    fn set_target_linear_speed(&mut self, speed: f32) {
        self.motion.set_target_linear_speed(speed);
    }

    fn set_target_angular_speed(&mut self, speed: f32) {
        self.motion.set_target_angular_speed(speed);
    }

    fn target_linear_speed(&self) -> f32 {
        self.motion.target_linear_speed()
    }

    fn target_angular_speed(&self) -> f32 {
        self.motion.target_angular_speed()
    }

    fn ideal_linear_speed(&self) -> f32 {
        self.motion.ideal_linear_speed()
    }

    fn ideal_angular_speed(&self) -> f32 {
        self.motion.ideal_angular_speed()
    }

    fn measured_linear_speed(&self) -> f32 {
        self.motion.measured_linear_speed()
    }

    fn measured_angular_speed(&self) -> f32 {
        self.motion.measured_angular_speed()
    }

    fn linear_acceleration(&self) -> f32 {
        self.motion.linear_acceleration()
    }

    fn set_linear_acceleration(&mut self, value: f32) {
        self.motion.set_linear_acceleration(value);
    }

    fn linear_deceleration(&self) -> f32 {
        self.motion.linear_deceleration()
    }

    fn set_linear_deceleration(&mut self, value: f32) {
        self.motion.set_linear_deceleration(value);
    }

    fn max_linear_speed(&self) -> f32 {
        self.motion.max_linear_speed()
    }

    fn set_max_linear_speed(&mut self, value: f32) {
        self.motion.set_max_linear_speed(value);
    }

    fn reset_motion(&mut self) {
        self.motion.reset_motion();
    }

    fn reset_control_errors(&mut self) {
        self.motion.reset_control_errors();
    }

    fn required_micrometers_to_speed(&self, speed: f32) -> f32 {
        self.motion.required_micrometers_to_speed(speed)
    }

    fn on_odometry(&mut self, left_micrometers: i32, right_micrometers: i32) {
        self.motion.on_odometry(left_micrometers, right_micrometers);
    }

    fn on_frame(&mut self, frame: &SensorFrame) {
        self.motion.on_frame(frame);
    }
}
