//! Fuzz target: `AppCommand::from_str`
//!
//! Console lines come straight off the UART.  Any input must either parse
//! or return a `ParseCommandError`; parsed values must be in range.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use mousecal::app::commands::AppCommand;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(cmd) = line.parse::<AppCommand>() {
        if let AppCommand::SetMicrometersPerCount(value) = cmd {
            assert!(value.is_finite(), "parser let a non-finite value through");
        }
        // Display of the error path is exercised by the console too.
        let _ = format!("{cmd:?}");
    }
});
