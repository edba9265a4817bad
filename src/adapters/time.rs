//! System tick adapter.
//!
//! Implements [`ClockPort`] for the foreground loop.
//!
//! - **`target_os = "espidf"`**: reads [`SYSTEM_CLOCK`], advanced by the
//!   1 kHz hardware timer in [`drivers::hw_timer`](crate::drivers::hw_timer).
//!   Sleeping blocks on a task notification given by the tick callback;
//!   the FreeRTOS tick is too coarse for millisecond pacing.
//! - **`not(target_os = "espidf")`**: derives ticks from
//!   `std::time::Instant` for host-side simulation.

use crate::app::ports::ClockPort;
#[cfg(target_os = "espidf")]
use crate::clock::{SYSTEM_CLOCK, elapsed};
#[cfg(target_os = "espidf")]
use crate::drivers::hw_timer::wait_for_tick;

pub struct SystemTicks {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    tick_frequency_hz: u32,
}

impl SystemTicks {
    pub fn new(tick_frequency_hz: u32) -> Self {
        #[cfg(target_os = "espidf")]
        let _ = tick_frequency_hz;
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            tick_frequency_hz: tick_frequency_hz.max(1),
        }
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for SystemTicks {
    fn ticks(&self) -> u32 {
        SYSTEM_CLOCK.now()
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        let start = SYSTEM_CLOCK.now();
        while elapsed(start, SYSTEM_CLOCK.now()) < ticks {
            wait_for_tick();
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for SystemTicks {
    fn ticks(&self) -> u32 {
        let micros = self.start.elapsed().as_micros();
        (micros * u128::from(self.tick_frequency_hz) / 1_000_000) as u32
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        let target = self.ticks().wrapping_add(ticks);
        let period = std::time::Duration::from_micros(1_000_000 / u64::from(self.tick_frequency_hz));
        while crate::clock::elapsed(self.ticks(), target) as i32 > 0 {
            std::thread::sleep(period);
        }
    }
}
