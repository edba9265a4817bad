//! Port traits — the hexagonal boundary between domain logic and the robot.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (encoders, rangefinders, motion controller, event sinks,
//! storage) implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the calibration logic never touches
//! hardware directly and runs unchanged against the host simulator.

use crate::config::RobotConfig;
use crate::sensors::SensorFrame;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// System tick source and the only place the foreground may block.
pub trait ClockPort {
    /// Current tick count (wraps at `u32::MAX`).
    fn ticks(&self) -> u32;

    /// Block until `ticks` more ticks have elapsed.
    fn sleep_ticks(&mut self, ticks: u32);
}

// ───────────────────────────────────────────────────────────────
// Encoder port
// ───────────────────────────────────────────────────────────────

/// Free-running 16-bit quadrature counters, one per wheel.
pub trait EncoderPort {
    fn left_count(&self) -> u16;
    fn right_count(&self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Sensor port
// ───────────────────────────────────────────────────────────────

/// Read-side port for the rangefinder sweep.
pub trait SensorPort {
    /// Latest complete frame.  Never torn.
    fn frame(&self) -> SensorFrame;
}

// ───────────────────────────────────────────────────────────────
// Motion port (external speed controller)
// ───────────────────────────────────────────────────────────────

/// The closed-loop speed controller.  Speeds are m/s and rad/s,
/// accelerations m/s².
pub trait MotionPort {
    fn enable_motor_control(&mut self);
    fn disable_motor_control(&mut self);

    /// Wall-following correction from the side sensors.
    fn side_sensors_control(&mut self, enabled: bool);
    /// Wall-distance correction from the front sensors.
    fn front_sensors_control(&mut self, enabled: bool);

    fn disable_walls_control(&mut self) {
        self.side_sensors_control(false);
        self.front_sensors_control(false);
    }

    /// Record the current side readings as the centred reference.
    fn side_sensors_calibration(&mut self);

    fn set_target_linear_speed(&mut self, speed: f32);
    fn set_target_angular_speed(&mut self, speed: f32);
    fn target_linear_speed(&self) -> f32;
    fn target_angular_speed(&self) -> f32;

    /// Acceleration-limited setpoints actually fed to the loops.
    fn ideal_linear_speed(&self) -> f32;
    fn ideal_angular_speed(&self) -> f32;
    fn measured_linear_speed(&self) -> f32;
    fn measured_angular_speed(&self) -> f32;

    fn linear_acceleration(&self) -> f32;
    fn set_linear_acceleration(&mut self, value: f32);
    fn linear_deceleration(&self) -> f32;
    fn set_linear_deceleration(&mut self, value: f32);
    fn max_linear_speed(&self) -> f32;
    fn set_max_linear_speed(&mut self, value: f32);

    /// Stop, zero every target and drop controller state.
    fn reset_motion(&mut self);
    /// Clear accumulated loop errors without touching targets.
    fn reset_control_errors(&mut self);

    /// Distance needed to bring the ideal linear speed to `speed` with the
    /// current limits (µm).
    fn required_micrometers_to_speed(&self, speed: f32) -> f32;

    /// Wheel travel of the latest encoder poll (µm).  Advances the
    /// controller by one tick.
    fn on_odometry(&mut self, left_micrometers: i32, right_micrometers: i32);

    /// Latest rangefinder frame, for wall corrections.
    fn on_frame(&mut self, _frame: &SensorFrame) {}
}

/// Everything a calibration run drives, as one handle.  Passing a single
/// `&mut` avoids borrowing the robot twice.
pub trait RobotHw: ClockPort + EncoderPort + SensorPort + MotionPort {}

impl<T: ClockPort + EncoderPort + SensorPort + MotionPort> RobotHw for T {}

// ───────────────────────────────────────────────────────────────
// Motor port
// ───────────────────────────────────────────────────────────────

/// Raw drive output.  Power is signed, -1.0 (full reverse) to 1.0.
pub trait MotorPort {
    fn set_power(&mut self, left: f32, right: f32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists robot configuration.
///
/// Implementations MUST run [`RobotConfig::validate`] before persisting.
pub trait ConfigPort {
    /// Returns [`RobotConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<RobotConfig, ConfigError>;

    fn save(&self, config: &RobotConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
