//! The production `Robot` adapter wired to the real speed controller and
//! sensor pipeline, with scripted encoders, motors and sweeps.

use std::cell::Cell;

use mousecal::adapters::hardware::Robot;
use mousecal::app::ports::{ClockPort, EncoderPort, MotionPort, MotorPort, SensorPort};
use mousecal::app::service::AppService;
use mousecal::calibration::ProcedureId;
use mousecal::config::RobotConfig;
use mousecal::control::SpeedController;
use mousecal::sensors::{ChannelMap, InjectedAdc, SensorPipeline};

use crate::mock_hw::RecordingSink;

// ── Scripted peripherals ──────────────────────────────────────

/// Encoders that never move.
struct StillEncoders;

impl EncoderPort for StillEncoders {
    fn left_count(&self) -> u16 {
        1234
    }

    fn right_count(&self) -> u16 {
        4321
    }
}

#[derive(Default)]
struct RecordingMotors {
    writes: Vec<(f32, f32)>,
}

impl MotorPort for RecordingMotors {
    fn set_power(&mut self, left: f32, right: f32) {
        self.writes.push((left, right));
    }
}

/// ADC returning `base + rank` on every rank.
struct RampAdc {
    base: u16,
}

impl InjectedAdc for RampAdc {
    fn clear_end_of_conversion(&mut self) {}

    fn read_injected(&mut self, rank: u8) -> u16 {
        self.base + u16::from(rank)
    }
}

/// Tick source that completes one sweep per tick, like the sweep timer.
struct SweepClock {
    now: Cell<u32>,
    pipeline: &'static SensorPipeline,
}

impl ClockPort for SweepClock {
    fn ticks(&self) -> u32 {
        self.now.get()
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.now.set(self.now.get() + 1);
            let mut adc = RampAdc {
                base: (self.now.get() % 1000) as u16,
            };
            self.pipeline
                .on_conversion_complete(&mut adc, &ChannelMap::default());
        }
    }
}

type TestRobot = Robot<StillEncoders, RecordingMotors, SweepClock>;

fn robot(config: &RobotConfig) -> TestRobot {
    let pipeline: &'static SensorPipeline = Box::leak(Box::new(SensorPipeline::new()));
    Robot::new(
        StillEncoders,
        pipeline,
        SpeedController::new(RecordingMotors::default(), config),
        SweepClock {
            now: Cell::new(0),
            pipeline,
        },
    )
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn frames_come_from_the_shared_pipeline() {
    let config = RobotConfig::default();
    let mut hw = robot(&config);
    assert_eq!(hw.frame().sequence, 0);

    hw.sleep_ticks(3);
    let frame = hw.frame();
    assert_eq!(frame.sequence, 3);
    // Default map: rank 1 → side left … rank 4 → front right.
    assert_eq!(frame.side_left, 4);
    assert_eq!(frame.front_right, 7);
}

#[test]
fn side_calibration_uses_the_latest_sweep() {
    let config = RobotConfig::default();
    let mut hw = robot(&config);
    hw.sleep_ticks(10);

    hw.side_sensors_calibration();

    assert_eq!(hw.motion().walls().side_reference, Some((11, 12)));
}

#[test]
fn static_turn_drives_motors_and_leaves_them_off() {
    let config = RobotConfig::default();
    let mut hw = robot(&config);
    let mut app = AppService::new(config.clone(), &hw);
    let mut sink = RecordingSink::new();

    let summary = app
        .run_procedure(ProcedureId::StaticTurnRight, &mut hw, &mut sink)
        .unwrap();

    assert_eq!(summary.ticks, 1325);
    assert_eq!(summary.travelled_um, 0);

    let writes = &hw.motion().motors().writes;
    // Wheels stalled: the angular loop pushes them apart.
    assert!(writes.iter().any(|(l, r)| *l < 0.0 && *r > 0.0));
    assert_eq!(writes.last(), Some(&(0.0, 0.0)));
    assert!(!hw.motion().is_enabled());
    assert_eq!(hw.max_linear_speed(), config.max_linear_speed);
}

#[test]
fn applied_config_reaches_the_controller() {
    let config = RobotConfig::default();
    let mut hw = robot(&config);
    let faster = RobotConfig {
        max_linear_speed: 1.2,
        ..config
    };

    hw.apply_config(&faster);
    hw.set_target_linear_speed(5.0);

    assert_eq!(hw.target_linear_speed(), 1.2);
}
