//! Raw reading → distance transform.
//!
//! Reflected IR intensity falls off roughly exponentially with distance
//! over the useful range, so each sensor is modelled as
//! `d = a / ln(raw) - b` with per-sensor constants fitted from a
//! front-sensor calibration run.

use serde::{Deserialize, Serialize};

use super::{SensorFrame, SensorId};

/// Distance reported for readings too weak to be meaningful (m).
pub const OUT_OF_RANGE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    pub a: f32,
    pub b: f32,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self { a: 2.8, b: 0.23 }
    }
}

impl SensorCalibration {
    pub fn distance(&self, raw: u16) -> f32 {
        if raw <= 1 {
            return OUT_OF_RANGE;
        }
        let log = f32::from(raw).ln();
        (self.a / log - self.b).clamp(0.0, OUT_OF_RANGE)
    }
}

/// Estimated distance per sensor (m).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDistances {
    pub side_left: f32,
    pub side_right: f32,
    pub front_left: f32,
    pub front_right: f32,
}

pub struct DistanceEstimator {
    calibration: [SensorCalibration; SensorId::COUNT],
    latest: SensorDistances,
}

impl DistanceEstimator {
    pub fn new(calibration: [SensorCalibration; SensorId::COUNT]) -> Self {
        Self {
            calibration,
            latest: SensorDistances::default(),
        }
    }

    pub fn set_calibration(&mut self, calibration: [SensorCalibration; SensorId::COUNT]) {
        self.calibration = calibration;
    }

    /// Transform a frame and keep the result as the latest estimate.
    pub fn update(&mut self, frame: &SensorFrame) -> SensorDistances {
        let d = |id: SensorId| self.calibration[id.index()].distance(frame.get(id));
        self.latest = SensorDistances {
            side_left: d(SensorId::SideLeft),
            side_right: d(SensorId::SideRight),
            front_left: d(SensorId::FrontLeft),
            front_right: d(SensorId::FrontRight),
        };
        self.latest
    }

    pub fn latest(&self) -> SensorDistances {
        self.latest
    }
}
