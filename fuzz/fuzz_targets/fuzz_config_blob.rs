//! Fuzz target: stored configuration decode
//!
//! NVS can hand back any bytes after a partial write or a layout change.
//! Decoding must never panic, and anything that decodes and validates
//! must survive a re-encode unchanged.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use mousecal::config::RobotConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = postcard::from_bytes::<RobotConfig>(data) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }
    let bytes = postcard::to_allocvec(&config).expect("encode");
    let again: RobotConfig = postcard::from_bytes(&bytes).expect("decode");
    // Compare encodings: a NaN gain would defeat PartialEq.
    assert_eq!(postcard::to_allocvec(&again).expect("encode"), bytes);
});
