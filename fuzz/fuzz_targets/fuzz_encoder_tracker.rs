//! Fuzz target: `EncoderDistanceTracker::poll`
//!
//! Feeds arbitrary counter readings and checks that accumulated counts
//! always equal the sum of the wrap-corrected deltas, error or not.
//!
//! cargo fuzz run fuzz_encoder_tracker

#![no_main]

use core::cell::Cell;

use libfuzzer_sys::fuzz_target;
use mousecal::app::ports::EncoderPort;
use mousecal::config::RobotConfig;
use mousecal::encoder::{EncoderDistanceTracker, Wheel, wrapping_delta};

struct Counters {
    left: Cell<u16>,
    right: Cell<u16>,
}

impl EncoderPort for Counters {
    fn left_count(&self) -> u16 {
        self.left.get()
    }

    fn right_count(&self) -> u16 {
        self.right.get()
    }
}

fuzz_target!(|data: &[u8]| {
    let config = RobotConfig::default();
    let counters = Counters {
        left: Cell::new(0),
        right: Cell::new(0),
    };
    let mut tracker = EncoderDistanceTracker::new(&config, &counters);
    let mut expected = (0i64, 0i64);

    for chunk in data.chunks_exact(4) {
        let left = u16::from_le_bytes([chunk[0], chunk[1]]);
        let right = u16::from_le_bytes([chunk[2], chunk[3]]);
        expected.0 += i64::from(wrapping_delta(counters.left.get(), left));
        expected.1 += i64::from(wrapping_delta(counters.right.get(), right));
        counters.left.set(left);
        counters.right.set(right);

        let result = tracker.poll(&counters);
        let worst = tracker.max_observed_delta();
        if worst <= config.max_poll_delta_counts {
            assert!(result.is_ok());
        }
    }

    assert_eq!(tracker.counts(Wheel::Left), expected.0);
    assert_eq!(tracker.counts(Wheel::Right), expected.1);
});
