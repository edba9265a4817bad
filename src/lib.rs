//! Mousecal firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod control;
pub mod encoder;
pub mod error;
pub mod fsm;
pub mod periodic;
pub mod sensors;

// Peripheral-facing modules; target code inside is cfg-gated.
pub mod adapters;
pub mod drivers;
mod pins;

pub use error::Error;
