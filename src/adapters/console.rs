//! Serial console adapter.
//!
//! A reader thread turns console lines into [`AppCommand`]s and queues
//! them on [`COMMANDS`] for the foreground loop.  Unparseable lines are
//! logged and dropped; so are commands arriving while the queue is full.

use std::io::{self, BufRead};
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::channels::COMMANDS;
use crate::app::commands::AppCommand;
use crate::drivers::task_pin::{Core, spawn_on_core};

/// Back-off when a non-blocking UART has no input yet.
const IDLE_POLL: Duration = Duration::from_millis(20);

const CONSOLE_PRIORITY: u8 = 3;
const CONSOLE_STACK_KB: usize = 6;

/// Start reading stdin on its own thread.
pub fn spawn_console_reader() -> io::Result<JoinHandle<()>> {
    spawn_on_core(Core::Pro, CONSOLE_PRIORITY, CONSOLE_STACK_KB, "console\0", || {
        let forwarded = forward_lines(io::stdin().lock(), &COMMANDS);
        info!("Console: input closed after {} commands", forwarded);
    })
}

/// Parse each line of `reader` and queue it on `channel` until EOF.
/// Returns the number of commands queued.
pub fn forward_lines<R: BufRead, const N: usize>(
    mut reader: R,
    channel: &Channel<CriticalSectionRawMutex, AppCommand, N>,
) -> usize {
    let mut forwarded = 0;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return forwarded,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
            Err(e) => {
                warn!("Console: read failed: {}", e);
                return forwarded;
            }
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match text.parse::<AppCommand>() {
            Ok(cmd) => {
                if channel.try_send(cmd).is_ok() {
                    forwarded += 1;
                } else {
                    warn!("Console: busy, dropped '{}'", text);
                }
            }
            Err(e) => warn!("Console: '{}': {}", text, e),
        }
    }
}
