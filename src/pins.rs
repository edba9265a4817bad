//! GPIO / peripheral pin assignments for the mouse main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Drive motors (DRV8833-style dual H-bridge, PWM + direction per wheel)
// ---------------------------------------------------------------------------

/// LEDC PWM output for the left motor.
pub const LEFT_MOTOR_PWM_GPIO: i32 = 1;
/// Digital output: HIGH = reverse, LOW = forward.
pub const LEFT_MOTOR_DIR_GPIO: i32 = 2;
pub const RIGHT_MOTOR_PWM_GPIO: i32 = 3;
pub const RIGHT_MOTOR_DIR_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Quadrature encoders (PCNT)
// ---------------------------------------------------------------------------

pub const LEFT_ENCODER_A_GPIO: i32 = 10;
pub const LEFT_ENCODER_B_GPIO: i32 = 11;
pub const RIGHT_ENCODER_A_GPIO: i32 = 12;
pub const RIGHT_ENCODER_B_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Rangefinders — Analog (ADC1), one channel per sweep rank
// ---------------------------------------------------------------------------

/// ADC1 channels in rank order (GPIO 5, 6, 7, 8 on ESP32-S3).
pub const RANGEFINDER_ADC_CHANNELS: [u32; 4] = [4, 5, 6, 7];

// ---------------------------------------------------------------------------
// PWM / timer configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  10-bit gives 0 – 1023 duty levels.
pub const MOTOR_PWM_RESOLUTION_BITS: u32 = 10;
/// LEDC base frequency for the drive motors (20 kHz, inaudible).
pub const MOTOR_PWM_FREQ_HZ: u32 = 20_000;
/// Period of the rangefinder sweep timer.
pub const SENSOR_SWEEP_PERIOD_US: u64 = 1_000;
