//! Mousecal Firmware — Main Entry Point
//!
//! Hexagonal architecture with a command-driven foreground loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Robot               LogEventSink   NvsAdapter   SystemTicks   │
//! │  (Encoder+Sensor+    (EventSink)    (Config)     (Clock)       │
//! │   Motion)            Console reader (COMMANDS channel)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Sequencer FSM · Encoder tracker · Stall monitor       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer: 1 kHz tick · rangefinder sweep → SENSOR_PIPELINE   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use mousecal::adapters::console::spawn_console_reader;
use mousecal::adapters::hardware::Robot;
use mousecal::adapters::log_sink::LogEventSink;
use mousecal::adapters::nvs::NvsAdapter;
use mousecal::adapters::time::SystemTicks;
use mousecal::app::channels::COMMANDS;
use mousecal::app::ports::{ConfigPort, MotionPort};
use mousecal::app::service::AppService;
use mousecal::config::RobotConfig;
use mousecal::control::SpeedController;
use mousecal::drivers::hw_init;
use mousecal::drivers::hw_timer;
use mousecal::drivers::motor::{DriveMotor, DriveMotors};
use mousecal::sensors::SENSOR_PIPELINE;

/// Foreground idle poll period while no command is queued.
const IDLE_POLL_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Mousecal v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            RobotConfig::default()
        }
    };

    // ── 3. Peripherals + timers ───────────────────────────────
    let adc = hw_init::init_adc()?;
    let encoders = hw_init::init_encoders()?;
    let outputs = hw_init::init_motor_outputs()?;
    hw_timer::start_timers(config.tick_frequency_hz, adc, config.channel_map)?;

    let motors = DriveMotors::new(
        DriveMotor::new(outputs.left_pwm, outputs.left_dir, false),
        // Right motor is mounted mirrored.
        DriveMotor::new(outputs.right_pwm, outputs.right_dir, true),
    );

    // ── 4. Adapters + service ─────────────────────────────────
    let mut robot = Robot::new(
        encoders,
        &SENSOR_PIPELINE,
        SpeedController::new(motors, &config),
        SystemTicks::new(config.tick_frequency_hz),
    );
    robot.reset_motion();

    let mut log_sink = LogEventSink::new();
    let mut app = AppService::new(config, &robot);

    let _console = spawn_console_reader()?;
    info!("System ready. Type a command (run linear|angular|turn|mpc N|front, profile, sensors N, set mpc X, save).");

    // ── 5. Command loop ───────────────────────────────────────
    loop {
        let Ok(cmd) = COMMANDS.try_receive() else {
            FreeRtos::delay_ms(IDLE_POLL_MS);
            continue;
        };

        info!("Command: {:?}", cmd);
        match app.handle_command(cmd, &mut robot, &mut log_sink, &nvs) {
            Ok(()) => robot.apply_config(app.config()),
            Err(e) => error!("Command failed: {}", e),
        }
    }
}
