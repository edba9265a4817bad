//! Unified error types for the calibration firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! scheduling loop has one abort path.  All variants are `Copy` so they can
//! travel through the sequencer and event sink without allocation.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::encoder::Wheel;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A procedure or configuration parameter is unusable.  Raised before
    /// any motion command is issued.
    Config(&'static str),
    /// The foreground fell behind a real-time bound.
    Timing(TimingViolation),
    /// A peripheral stopped producing data.
    Hardware(HardwareFault),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Timing(e) => write!(f, "timing: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Timing violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingViolation {
    /// A wheel moved further between two polls than the 16-bit counter can
    /// disambiguate with the configured margin.
    EncoderDelta { wheel: Wheel, counts: i32, limit: u16 },
    /// The distance-transform probe ran past its tick budget.
    ProfilingBudget { ticks: u32, budget: u32 },
}

impl fmt::Display for TimingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncoderDelta {
                wheel,
                counts,
                limit,
            } => write!(
                f,
                "{wheel:?} encoder moved {counts} counts in one poll (limit {limit})"
            ),
            Self::ProfilingBudget { ticks, budget } => {
                write!(f, "profiling took {ticks} ticks (budget {budget})")
            }
        }
    }
}

impl From<TimingViolation> for Error {
    fn from(e: TimingViolation) -> Self {
        Self::Timing(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// The sensor sweep stopped publishing frames.
    SensorStall { sequence: u32, stalled_ticks: u32 },
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorStall {
                sequence,
                stalled_ticks,
            } => write!(
                f,
                "sensor frames stuck at sequence {sequence} for {stalled_ticks} ticks"
            ),
        }
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Self {
        Self::Hardware(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("no stored config"),
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::IoError => Self::Config("config storage I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
