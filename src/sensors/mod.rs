//! Infrared rangefinder subsystem.
//!
//! The four emitter/receiver pairs are sampled by a timer-triggered
//! injected-conversion sweep.  The completion handler in [`pipeline`]
//! publishes each sweep through the sequence lock in [`frame`]; the
//! foreground only ever sees whole [`SensorFrame`] copies.

pub mod distance;
pub mod frame;
pub mod pipeline;
pub mod stall;

use serde::{Deserialize, Serialize};

pub use distance::{DistanceEstimator, SensorCalibration, SensorDistances};
pub use frame::FrameCell;
pub use pipeline::{ChannelMap, InjectedAdc, SENSOR_PIPELINE, SensorPipeline};
pub use stall::StallMonitor;

/// Logical sensor position on the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorId {
    SideLeft = 0,
    SideRight = 1,
    FrontLeft = 2,
    FrontRight = 3,
}

impl SensorId {
    pub const COUNT: usize = 4;
    pub const ALL: [SensorId; Self::COUNT] = [
        Self::SideLeft,
        Self::SideRight,
        Self::FrontLeft,
        Self::FrontRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One complete sweep of the four raw ADC readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub side_left: u16,
    pub side_right: u16,
    pub front_left: u16,
    pub front_right: u16,
    /// Number of completed sweeps when this frame was published.
    pub sequence: u32,
}

impl SensorFrame {
    pub fn from_raw(raw: [u16; SensorId::COUNT], sequence: u32) -> Self {
        Self {
            side_left: raw[SensorId::SideLeft.index()],
            side_right: raw[SensorId::SideRight.index()],
            front_left: raw[SensorId::FrontLeft.index()],
            front_right: raw[SensorId::FrontRight.index()],
            sequence,
        }
    }

    pub fn get(&self, id: SensorId) -> u16 {
        match id {
            SensorId::SideLeft => self.side_left,
            SensorId::SideRight => self.side_right,
            SensorId::FrontLeft => self.front_left,
            SensorId::FrontRight => self.front_right,
        }
    }
}
