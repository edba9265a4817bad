//! Detects a sweep trigger that stopped firing.
//!
//! The pipeline itself cannot tell it has stalled: the last frame simply
//! stays frozen.  The foreground watches the frame sequence instead and
//! faults once it has not moved for longer than the configured window.

use crate::clock::elapsed;
use crate::error::{Error, HardwareFault};

pub struct StallMonitor {
    limit_ticks: u32,
    last_sequence: Option<u32>,
    last_change: u32,
}

impl StallMonitor {
    pub fn new(limit_ticks: u32) -> Self {
        Self {
            limit_ticks,
            last_sequence: None,
            last_change: 0,
        }
    }

    /// Forget history, e.g. at the start of a procedure.
    pub fn rearm(&mut self) {
        self.last_sequence = None;
    }

    pub fn observe(&mut self, sequence: u32, now: u32) -> Result<(), Error> {
        match self.last_sequence {
            Some(last) if last == sequence => {
                let stalled = elapsed(self.last_change, now);
                if stalled > self.limit_ticks {
                    return Err(HardwareFault::SensorStall {
                        sequence,
                        stalled_ticks: stalled,
                    }
                    .into());
                }
            }
            _ => {
                self.last_sequence = Some(sequence);
                self.last_change = now;
            }
        }
        Ok(())
    }
}
