//! Motor drivers, hardware initialisation, timers and task placement.

pub mod hw_init;
pub mod hw_timer;
pub mod motor;
pub mod task_pin;
