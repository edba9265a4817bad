//! Torn-free frame publication between the sweep handler and the
//! foreground.
//!
//! A single-writer sequence lock.  The writer makes the sequence odd,
//! stores the four readings, then makes it even again with release
//! ordering.  A reader copies the readings between two loads of the
//! sequence and retries if it changed or was odd.  The writer never waits,
//! which is what the interrupt context needs; the reader can only be
//! delayed by a sweep completing mid-copy.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering, fence};

use super::{SensorFrame, SensorId};

pub struct FrameCell {
    seq: AtomicU32,
    raw: [AtomicU16; SensorId::COUNT],
}

impl FrameCell {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            raw: [
                AtomicU16::new(0),
                AtomicU16::new(0),
                AtomicU16::new(0),
                AtomicU16::new(0),
            ],
        }
    }

    /// Publish a complete sweep.  Must only be called from one context.
    pub fn publish(&self, raw: [u16; SensorId::COUNT]) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, value) in self.raw.iter().zip(raw) {
            slot.store(value, Ordering::Relaxed);
        }
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy the latest complete frame.
    pub fn snapshot(&self) -> SensorFrame {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                core::hint::spin_loop();
                continue;
            }
            let mut raw = [0u16; SensorId::COUNT];
            for (value, slot) in raw.iter_mut().zip(&self.raw) {
                *value = slot.load(Ordering::Relaxed);
            }
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return SensorFrame::from_raw(raw, before >> 1);
            }
        }
    }

    /// Number of sweeps published so far.
    pub fn sequence(&self) -> u32 {
        self.seq.load(Ordering::Acquire) >> 1
    }
}

impl Default for FrameCell {
    fn default() -> Self {
        Self::new()
    }
}
