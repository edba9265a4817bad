//! Inter-task command channel.
//!
//! The console reader runs on its own thread and hands parsed commands to
//! the foreground loop through a bounded `embassy-sync` channel.  No heap,
//! no locks held across a procedure.
//!
//! ```text
//! ┌────────────────┐  AppCommand  ┌──────────────────┐
//! │ Console reader │─────────────▶│ Foreground loop  │
//! │  (thread)      │              │ (AppService)     │
//! └────────────────┘              └──────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::commands::AppCommand;

/// Channel depth for queued console commands.
const COMMAND_DEPTH: usize = 4;

/// Inbound command channel: console → foreground loop.
pub static COMMANDS: Channel<CriticalSectionRawMutex, AppCommand, COMMAND_DEPTH> = Channel::new();
