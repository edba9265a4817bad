//! PID controller for the speed loops
//!
//! Plain proportional-integral-derivative controller with output clamping
//! and conditional-integration anti-windup.  The setpoint is passed on
//! every call since both loops track a moving ideal speed.

use crate::config::PidGains;

pub struct PidController {
    gains: PidGains,
    integral: f32,
    prev_error: f32,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    /// Output is clamped to ±1 (full motor power) until
    /// [`set_limits`](Self::set_limits) says otherwise.
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: 0.0,
            output_min: -1.0,
            output_max: 1.0,
        }
    }

    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn compute(&mut self, setpoint: f32, measurement: f32, dt: f32) -> f32 {
        let error = setpoint - measurement;

        let p = self.gains.kp * error;

        self.integral += error * dt;
        let i = self.gains.ki * self.integral;

        let derivative = if dt > 0.0 {
            (error - self.prev_error) / dt
        } else {
            0.0
        };
        let d = self.gains.kd * derivative;

        self.prev_error = error;

        let output = (p + i + d).clamp(self.output_min, self.output_max);

        // Saturated: undo this step's integration.
        if output >= self.output_max || output <= self.output_min {
            self.integral -= error * dt;
        }

        output
    }

    /// Drop accumulated integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}
