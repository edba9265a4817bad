//! AppService command handling, probes and configuration.

use std::cell::Cell;

use crate::mock_hw::{MockNvs, RecordingSink, SimRobot};

use mousecal::app::commands::AppCommand;
use mousecal::app::events::AppEvent;
use mousecal::app::ports::{ClockPort, ConfigPort, SensorPort};
use mousecal::app::service::AppService;
use mousecal::calibration::ProcedureId;
use mousecal::config::RobotConfig;
use mousecal::error::{Error, TimingViolation};
use mousecal::sensors::SensorFrame;

fn setup() -> (AppService, SimRobot, RecordingSink, MockNvs) {
    let config = RobotConfig::default();
    let hw = SimRobot::new(&config);
    let app = AppService::new(config, &hw);
    (app, hw, RecordingSink::new(), MockNvs::new())
}

// ── Sensor streaming ──────────────────────────────────────────

#[test]
fn stream_sensors_reports_once_per_interval() {
    let (mut app, mut hw, mut sink, _) = setup();

    app.stream_sensors(&mut hw, 1000, &mut sink);

    let frames: Vec<&SensorFrame> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::SensorFrame(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 10);
    assert!(frames.windows(2).all(|w| w[1].sequence - w[0].sequence == 100));
    assert_eq!(hw.tick, 1000);
}

// ── Profiling probe ───────────────────────────────────────────

/// Clock that advances by one tick every time it is read.
struct SlowClock {
    now: Cell<u32>,
}

impl ClockPort for SlowClock {
    fn ticks(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now + 1);
        now
    }

    fn sleep_ticks(&mut self, ticks: u32) {
        self.now.set(self.now.get() + ticks);
    }
}

impl SensorPort for SlowClock {
    fn frame(&self) -> SensorFrame {
        SensorFrame {
            front_left: 500,
            front_right: 500,
            ..SensorFrame::default()
        }
    }
}

#[test]
fn profiling_within_budget_reports_distances() {
    let (mut app, mut hw, mut sink, _) = setup();

    let report = app.profile_distances(&mut hw, &mut sink).unwrap();

    assert_eq!(report.iterations, 1000);
    assert_eq!(report.ticks, 0);
    assert!(report.last.front_left > 0.0 && report.last.front_left < 1.0);
    assert!(matches!(sink.events.as_slice(), [AppEvent::Profiling(_)]));
}

#[test]
fn profiling_over_budget_is_a_timing_violation() {
    let config = RobotConfig {
        profiling_budget_ticks: 0,
        ..RobotConfig::default()
    };
    let encoders = SimRobot::new(&config);
    let mut app = AppService::new(config, &encoders);
    let mut clock = SlowClock { now: Cell::new(0) };
    let mut sink = RecordingSink::new();

    let err = app.profile_distances(&mut clock, &mut sink).unwrap_err();

    assert_eq!(
        err,
        Error::Timing(TimingViolation::ProfilingBudget {
            ticks: 1,
            budget: 0
        })
    );
    // The report is still emitted so the measurement is not lost.
    assert!(matches!(sink.events.as_slice(), [AppEvent::Profiling(_)]));
}

/// Sensor source that counts reads and moves closer to the wall on each.
struct ApproachingWall {
    reads: Cell<u32>,
}

impl ClockPort for ApproachingWall {
    fn ticks(&self) -> u32 {
        0
    }

    fn sleep_ticks(&mut self, _ticks: u32) {}
}

impl SensorPort for ApproachingWall {
    fn frame(&self) -> SensorFrame {
        let reads = self.reads.get() + 1;
        self.reads.set(reads);
        let raw = 100 + reads as u16;
        SensorFrame {
            front_left: raw,
            front_right: raw,
            sequence: reads,
            ..SensorFrame::default()
        }
    }
}

#[test]
fn profiling_reads_the_sensors_on_every_iteration() {
    let (mut app, _, mut sink, _) = setup();
    let mut wall = ApproachingWall {
        reads: Cell::new(0),
    };

    let report = app.profile_distances(&mut wall, &mut sink).unwrap();
    assert_eq!(wall.reads.get(), report.iterations);

    // A single-iteration run sees only the first, farthest frame.
    let config = RobotConfig {
        profiling_iterations: 1,
        ..RobotConfig::default()
    };
    let encoders = SimRobot::new(&config);
    let mut single = AppService::new(config, &encoders);
    let mut fresh = ApproachingWall {
        reads: Cell::new(0),
    };
    let first = single.profile_distances(&mut fresh, &mut sink).unwrap();

    assert_eq!(fresh.reads.get(), 1);
    assert!(report.last.front_left < first.last.front_left);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn parsed_run_command_executes_procedure() {
    let (mut app, mut hw, mut sink, nvs) = setup();
    let cmd: AppCommand = "run turn".parse().unwrap();

    app.handle_command(cmd, &mut hw, &mut sink, &nvs).unwrap();

    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ProcedureFinished(s) if s.procedure == ProcedureId::StaticTurnRight
    )));
}

#[test]
fn set_micrometers_per_count_then_save_persists() {
    let (mut app, mut hw, mut sink, nvs) = setup();

    app.handle_command(AppCommand::SetMicrometersPerCount(8.7), &mut hw, &mut sink, &nvs)
        .unwrap();
    assert!((app.config().micrometers_per_count - 8.7).abs() < f32::EPSILON);
    assert!(nvs.load().is_err(), "nothing is persisted until save");

    app.handle_command(AppCommand::SaveConfig, &mut hw, &mut sink, &nvs)
        .unwrap();
    assert_eq!(nvs.load().unwrap(), *app.config());
}

#[test]
fn invalid_config_is_rejected_and_old_one_kept() {
    let (mut app, mut hw, mut sink, nvs) = setup();

    let err = app
        .handle_command(AppCommand::SetMicrometersPerCount(0.01), &mut hw, &mut sink, &nvs)
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(*app.config(), RobotConfig::default());
}

#[test]
fn update_config_pushes_limits_to_motion() {
    let (mut app, mut hw, mut sink, nvs) = setup();
    let config = RobotConfig {
        max_linear_speed: 0.9,
        linear_acceleration: 6.0,
        ..RobotConfig::default()
    };

    app.handle_command(AppCommand::UpdateConfig(config.clone()), &mut hw, &mut sink, &nvs)
        .unwrap();

    use mousecal::app::ports::MotionPort;
    assert_eq!(hw.max_linear_speed(), 0.9);
    assert_eq!(hw.linear_acceleration(), 6.0);
    assert_eq!(*app.config(), config);
}

#[test]
fn new_calibration_changes_measured_distance() {
    let (mut app, mut hw, mut sink, nvs) = setup();
    let before = app
        .run_procedure(ProcedureId::MicrometersPerCount { cells: 1 }, &mut hw, &mut sink)
        .unwrap();

    // Pretend the tape said the robot went 10% further than it thought.
    let corrected = before
        .micrometers_per_count(before.travelled_um as f32 * 1.1)
        .unwrap();
    app.handle_command(AppCommand::SetMicrometersPerCount(corrected), &mut hw, &mut sink, &nvs)
        .unwrap();

    assert!((app.config().micrometers_per_count - 8.4 * 1.1).abs() < 0.05);
}
