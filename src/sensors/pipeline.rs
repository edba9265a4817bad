//! Sweep completion handling.
//!
//! A hardware timer triggers an injected conversion of four ranks in a
//! fixed order.  When the sweep completes, [`SensorPipeline::on_conversion_complete`]
//! runs in interrupt context: it acknowledges the end-of-conversion flag,
//! reads the four ranks in order and publishes them as one frame.
//!
//! Which physical channel feeds which rank is a board decision; the
//! [`ChannelMap`] says which logical sensor each rank carries.

use serde::{Deserialize, Serialize};

use super::frame::FrameCell;
use super::{SensorFrame, SensorId};

/// Register-level access to the injected conversion results.
pub trait InjectedAdc {
    /// Acknowledge the end-of-conversion flag so the next trigger can run.
    fn clear_end_of_conversion(&mut self);

    /// Result of injected rank `rank` (1-based, 1..=4).
    fn read_injected(&mut self, rank: u8) -> u16;
}

/// Rank → sensor assignment.  Index 0 is rank 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    ranks: [SensorId; SensorId::COUNT],
}

impl ChannelMap {
    pub const fn new(ranks: [SensorId; SensorId::COUNT]) -> Self {
        Self { ranks }
    }

    /// Sensor carried by 1-based `rank`.
    pub fn sensor_for_rank(&self, rank: u8) -> SensorId {
        self.ranks[usize::from(rank.saturating_sub(1)) % SensorId::COUNT]
    }

    /// True if every sensor is carried by exactly one rank.
    pub fn is_permutation(&self) -> bool {
        SensorId::ALL
            .iter()
            .all(|id| self.ranks.iter().filter(|r| *r == id).count() == 1)
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new([
            SensorId::SideLeft,
            SensorId::SideRight,
            SensorId::FrontLeft,
            SensorId::FrontRight,
        ])
    }
}

/// Publishes sweeps and hands out frames.
pub struct SensorPipeline {
    cell: FrameCell,
}

/// The pipeline fed by the sweep timer.
pub static SENSOR_PIPELINE: SensorPipeline = SensorPipeline::new();

impl SensorPipeline {
    pub const fn new() -> Self {
        Self {
            cell: FrameCell::new(),
        }
    }

    /// Sweep-complete handler.  Interrupt context: no allocation, no
    /// blocking, no logging.
    pub fn on_conversion_complete(&self, adc: &mut impl InjectedAdc, map: &ChannelMap) {
        adc.clear_end_of_conversion();
        let mut raw = [0u16; SensorId::COUNT];
        for rank in 1..=SensorId::COUNT as u8 {
            raw[map.sensor_for_rank(rank).index()] = adc.read_injected(rank);
        }
        self.cell.publish(raw);
    }

    /// Latest complete frame.
    pub fn snapshot(&self) -> SensorFrame {
        self.cell.snapshot()
    }

    pub fn sequence(&self) -> u32 {
        self.cell.sequence()
    }
}

impl Default for SensorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RegisterFile {
        results: [u16; 4],
        acked: u32,
        reads: Vec<u8>,
    }

    impl InjectedAdc for RegisterFile {
        fn clear_end_of_conversion(&mut self) {
            self.acked += 1;
        }

        fn read_injected(&mut self, rank: u8) -> u16 {
            self.reads.push(rank);
            self.results[usize::from(rank - 1)]
        }
    }

    #[test]
    fn default_map_follows_rank_order() {
        let pipeline = SensorPipeline::new();
        let mut adc = RegisterFile {
            results: [100, 200, 300, 400],
            ..Default::default()
        };
        pipeline.on_conversion_complete(&mut adc, &ChannelMap::default());

        let frame = pipeline.snapshot();
        assert_eq!(frame.side_left, 100);
        assert_eq!(frame.side_right, 200);
        assert_eq!(frame.front_left, 300);
        assert_eq!(frame.front_right, 400);
        assert_eq!(frame.sequence, 1);
        assert_eq!(adc.acked, 1);
        assert_eq!(adc.reads, vec![1, 2, 3, 4]);
    }

    #[test]
    fn remapped_ranks() {
        let pipeline = SensorPipeline::new();
        let map = ChannelMap::new([
            SensorId::FrontRight,
            SensorId::FrontLeft,
            SensorId::SideRight,
            SensorId::SideLeft,
        ]);
        assert!(map.is_permutation());
        let mut adc = RegisterFile {
            results: [1, 2, 3, 4],
            ..Default::default()
        };
        pipeline.on_conversion_complete(&mut adc, &map);
        let frame = pipeline.snapshot();
        assert_eq!(frame.front_right, 1);
        assert_eq!(frame.side_left, 4);
    }

    #[test]
    fn stalled_trigger_freezes_last_frame() {
        let pipeline = SensorPipeline::new();
        let mut adc = RegisterFile {
            results: [9, 9, 9, 9],
            ..Default::default()
        };
        pipeline.on_conversion_complete(&mut adc, &ChannelMap::default());
        let first = pipeline.snapshot();
        assert_eq!(pipeline.snapshot(), first);
        assert_eq!(pipeline.sequence(), 1);
    }
}
