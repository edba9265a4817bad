//! Robot configuration parameters
//!
//! Physical constants, motion limits and calibration data for the mouse.
//! Values can be overridden via NVS or the serial console.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::encoder::CountDirection;
use crate::sensors::{ChannelMap, SensorCalibration};

/// Gains for one PID loop of the speed controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Core robot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    // --- Timing ---
    /// System tick frequency (Hz).  Every duration in ticks assumes this.
    pub tick_frequency_hz: u32,

    // --- Encoders ---
    /// Distance travelled per encoder count (µm).
    pub micrometers_per_count: f32,
    pub left_encoder_direction: CountDirection,
    pub right_encoder_direction: CountDirection,
    /// Largest per-poll count delta accepted before a timing violation.
    pub max_poll_delta_counts: u16,
    /// Physical upper bound on wheel surface speed (m/s).
    pub max_wheel_speed: f32,

    // --- Geometry (m) ---
    pub cell_dimension: f32,
    pub wall_width: f32,
    pub mouse_head: f32,
    pub mouse_tail: f32,
    pub wheels_separation: f32,

    // --- Motion limits ---
    /// Linear acceleration (m/s²).
    pub linear_acceleration: f32,
    /// Linear deceleration (m/s², positive).
    pub linear_deceleration: f32,
    /// Max linear speed (m/s).
    pub max_linear_speed: f32,
    /// Angular acceleration (rad/s²).
    pub angular_acceleration: f32,
    /// Target angular speed for the angular profiles (rad/s).
    pub profile_angular_speed: f32,
    /// Cruise speed for the front-sensor calibration run (m/s).
    pub front_calibration_speed: f32,

    // --- Control ---
    pub linear_gains: PidGains,
    pub angular_gains: PidGains,

    // --- Sensors ---
    pub channel_map: ChannelMap,
    pub sensor_calibration: [SensorCalibration; 4],
    /// Ticks without a new frame before the sweep is considered stalled.
    pub sensor_stall_ticks: u32,
    /// Cadence of idle sensor reports (ticks).
    pub sensor_report_interval_ticks: u32,

    // --- Profiling ---
    pub profiling_iterations: u32,
    pub profiling_budget_ticks: u32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            tick_frequency_hz: 1000,

            micrometers_per_count: 8.4,
            left_encoder_direction: CountDirection::Up,
            right_encoder_direction: CountDirection::Up,
            max_poll_delta_counts: 16_384,
            max_wheel_speed: 4.0,

            cell_dimension: 0.18,
            wall_width: 0.012,
            mouse_head: 0.042,
            mouse_tail: 0.031,
            wheels_separation: 0.0792,

            linear_acceleration: 5.0,
            linear_deceleration: 5.0,
            max_linear_speed: 0.6,
            angular_acceleration: 32.0 * core::f32::consts::PI,
            profile_angular_speed: 4.0 * core::f32::consts::PI,
            front_calibration_speed: 0.3,

            linear_gains: PidGains {
                kp: 2.0,
                ki: 0.0,
                kd: 0.02,
            },
            angular_gains: PidGains {
                kp: 0.05,
                ki: 0.0,
                kd: 0.001,
            },

            channel_map: ChannelMap::default(),
            sensor_calibration: [SensorCalibration::default(); 4],
            sensor_stall_ticks: 10,
            sensor_report_interval_ticks: 100,

            profiling_iterations: 1000,
            profiling_budget_ticks: 20,
        }
    }
}

impl RobotConfig {
    /// Seconds per system tick.
    pub fn tick_period_secs(&self) -> f32 {
        1.0 / self.tick_frequency_hz as f32
    }

    /// Worst-case encoder counts a single wheel can travel in one tick.
    pub fn max_counts_per_tick(&self) -> f32 {
        self.max_wheel_speed * 1_000_000.0
            / self.micrometers_per_count
            / self.tick_frequency_hz as f32
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=10_000).contains(&self.tick_frequency_hz) {
            return Err(ConfigError::ValidationFailed(
                "tick_frequency_hz must be 100–10000",
            ));
        }
        if !(0.5..=100.0).contains(&self.micrometers_per_count) {
            return Err(ConfigError::ValidationFailed(
                "micrometers_per_count must be 0.5–100.0",
            ));
        }
        if self.max_poll_delta_counts == 0 || self.max_poll_delta_counts > i16::MAX as u16 {
            return Err(ConfigError::ValidationFailed(
                "max_poll_delta_counts must be 1–32767",
            ));
        }
        if !(self.max_wheel_speed > 0.0) {
            return Err(ConfigError::ValidationFailed("max_wheel_speed must be > 0"));
        }
        if self.max_counts_per_tick() >= f32::from(self.max_poll_delta_counts) {
            return Err(ConfigError::ValidationFailed(
                "encoder poll period too coarse for max_wheel_speed",
            ));
        }
        let geometry = [
            self.cell_dimension,
            self.wall_width,
            self.mouse_head,
            self.mouse_tail,
            self.wheels_separation,
        ];
        if geometry.iter().any(|v| !(*v > 0.0 && *v < 1.0)) {
            return Err(ConfigError::ValidationFailed(
                "geometry lengths must be 0–1 m",
            ));
        }
        if self.linear_acceleration <= 0.0 || self.linear_deceleration <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "linear acceleration and deceleration must be > 0",
            ));
        }
        if !(self.max_linear_speed > 0.0 && self.max_linear_speed <= self.max_wheel_speed) {
            return Err(ConfigError::ValidationFailed(
                "max_linear_speed must be > 0 and <= max_wheel_speed",
            ));
        }
        if self.angular_acceleration <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "angular_acceleration must be > 0",
            ));
        }
        if !self.channel_map.is_permutation() {
            return Err(ConfigError::ValidationFailed(
                "channel_map must assign every sensor exactly once",
            ));
        }
        if self.sensor_stall_ticks == 0 {
            return Err(ConfigError::ValidationFailed("sensor_stall_ticks must be > 0"));
        }
        if self.sensor_report_interval_ticks == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor_report_interval_ticks must be > 0",
            ));
        }
        if self.profiling_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "profiling_iterations must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorId;

    #[test]
    fn default_config_is_valid() {
        RobotConfig::default().validate().unwrap();
    }

    #[test]
    fn default_poll_rate_leaves_wrap_margin() {
        let c = RobotConfig::default();
        // ~476 counts per tick at 4 m/s, far from the 32768 ambiguity bound.
        assert!(c.max_counts_per_tick() < f32::from(c.max_poll_delta_counts) / 10.0);
    }

    #[test]
    fn coarse_poll_rate_is_rejected() {
        let c = RobotConfig {
            tick_frequency_hz: 100,
            micrometers_per_count: 0.5,
            max_wheel_speed: 100.0,
            max_linear_speed: 1.0,
            ..RobotConfig::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConfigError::ValidationFailed(msg)) if msg.contains("poll period")
        ));
    }

    #[test]
    fn duplicate_channel_is_rejected() {
        let mut c = RobotConfig::default();
        c.channel_map = ChannelMap::new([
            SensorId::SideLeft,
            SensorId::SideLeft,
            SensorId::FrontLeft,
            SensorId::FrontRight,
        ]);
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_max_speed_is_rejected() {
        let c = RobotConfig {
            max_linear_speed: 0.0,
            ..RobotConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = RobotConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: RobotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = RobotConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: RobotConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.channel_map, c2.channel_map);
        assert!((c.micrometers_per_count - c2.micrometers_per_count).abs() < 1e-6);
    }
}
