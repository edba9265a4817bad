//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the calibration firmware's orchestration: running
//! procedures, probing the distance transform, streaming sensor frames and
//! applying configuration.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod channels;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
