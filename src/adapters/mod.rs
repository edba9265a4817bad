//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                      | Connects to                |
//! |-------------|---------------------------------|----------------------------|
//! | `console`   | (feeds `COMMANDS`)              | UART / USB-CDC stdin       |
//! | `hardware`  | ClockPort, EncoderPort,         | PCNT, sensor pipeline,     |
//! |             | SensorPort, MotionPort          | speed controller + motors  |
//! | `log_sink`  | EventSink                       | Serial log output          |
//! | `nvs`       | ConfigPort                      | NVS / in-memory store      |
//! | `time`      | ClockPort                       | System tick counter        |

pub mod console;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
