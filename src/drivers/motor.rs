//! Drive motor driver.
//!
//! Each wheel is a PWM output for magnitude and a direction pin, through
//! the `embedded-hal` traits so the same code drives the LEDC peripheral
//! on target and recording mocks on the host.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::MotorPort;

/// One wheel: PWM magnitude plus a direction line.
pub struct DriveMotor<P, D> {
    pwm: P,
    dir: D,
    /// Flip the direction line for a motor mounted mirrored.
    inverted: bool,
    power: f32,
}

impl<P: SetDutyCycle, D: OutputPin> DriveMotor<P, D> {
    pub fn new(pwm: P, dir: D, inverted: bool) -> Self {
        Self {
            pwm,
            dir,
            inverted,
            power: 0.0,
        }
    }

    /// Apply a signed power fraction.  Values outside ±1 are clamped.
    pub fn set(&mut self, power: f32) -> Result<(), MotorError> {
        let power = if power.is_finite() {
            power.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let reverse = (power < 0.0) != self.inverted;
        self.dir
            .set_state(PinState::from(reverse))
            .map_err(|_| MotorError::Direction)?;

        let max = self.pwm.max_duty_cycle();
        let duty = (power.abs() * f32::from(max)).round() as u16;
        self.pwm
            .set_duty_cycle(duty.min(max))
            .map_err(|_| MotorError::Pwm)?;
        self.power = power;
        Ok(())
    }

    /// Last power successfully applied.
    pub fn power(&self) -> f32 {
        self.power
    }
}

/// Failure writing a motor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorError {
    Pwm,
    Direction,
}

impl core::fmt::Display for MotorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pwm => write!(f, "PWM duty write failed"),
            Self::Direction => write!(f, "direction pin write failed"),
        }
    }
}

/// The left/right pair behind [`MotorPort`].
pub struct DriveMotors<LP, LD, RP, RD> {
    pub left: DriveMotor<LP, LD>,
    pub right: DriveMotor<RP, RD>,
}

impl<LP, LD, RP, RD> DriveMotors<LP, LD, RP, RD>
where
    LP: SetDutyCycle,
    LD: OutputPin,
    RP: SetDutyCycle,
    RD: OutputPin,
{
    pub fn new(left: DriveMotor<LP, LD>, right: DriveMotor<RP, RD>) -> Self {
        Self { left, right }
    }
}

impl<LP, LD, RP, RD> MotorPort for DriveMotors<LP, LD, RP, RD>
where
    LP: SetDutyCycle,
    LD: OutputPin,
    RP: SetDutyCycle,
    RD: OutputPin,
{
    fn set_power(&mut self, left: f32, right: f32) {
        if let Err(e) = self.left.set(left) {
            warn!("motor: left {}", e);
        }
        if let Err(e) = self.right.set(right) {
            warn!("motor: right {}", e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
