//! End-to-end runs of every calibration procedure against the kinematic
//! robot: phase order, sampling cadence, totals and clean shutdown.

use crate::mock_hw::{RecordingSink, SimRobot};

use mousecal::app::events::{AppEvent, SamplePayload};
use mousecal::app::ports::MotionPort;
use mousecal::app::service::AppService;
use mousecal::calibration::ProcedureId;
use mousecal::config::RobotConfig;
use mousecal::error::{Error, HardwareFault, TimingViolation};
use mousecal::fsm::StateId;

fn setup(config: RobotConfig) -> (AppService, SimRobot, RecordingSink) {
    let hw = SimRobot::new(&config);
    let app = AppService::new(config, &hw);
    (app, hw, RecordingSink::new())
}

fn default_setup() -> (AppService, SimRobot, RecordingSink) {
    setup(RobotConfig::default())
}

// ── Linear speed profile ──────────────────────────────────────

#[test]
fn linear_profile_runs_every_phase_in_order() {
    let (mut app, mut hw, mut sink) = default_setup();

    let summary = app
        .run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap();

    assert_eq!(
        sink.phase_changes(),
        vec![
            (StateId::Idle, StateId::Baseline),
            (StateId::Baseline, StateId::RampUp),
            (StateId::RampUp, StateId::Hold),
            (StateId::Hold, StateId::RampDown),
            (StateId::RampDown, StateId::Settle),
            (StateId::Settle, StateId::Idle),
        ]
    );
    assert!(summary.travelled_um >= 500_000, "travelled {}", summary.travelled_um);
    assert!(summary.ticks > 3000);
    assert_eq!(app.state(), StateId::Idle);
    assert!(!hw.enabled, "robot must be left stopped");
    assert!(matches!(sink.events.first(), Some(AppEvent::ProcedureStarted(_))));
    assert!(matches!(sink.events.last(), Some(AppEvent::ProcedureFinished(_))));
}

#[test]
fn linear_profile_logs_baseline_every_ten_ticks_and_hold_every_tick() {
    let (mut app, mut hw, mut sink) = default_setup();
    app.run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap();

    let baseline: Vec<u32> = sink
        .samples()
        .filter(|r| r.phase == StateId::Baseline)
        .map(|r| r.tick)
        .collect();
    assert_eq!(baseline.len(), 100);
    assert!(baseline.windows(2).all(|w| w[1] - w[0] == 10));

    let hold: Vec<u32> = sink
        .samples()
        .filter(|r| r.phase == StateId::Hold)
        .map(|r| r.tick)
        .collect();
    assert!(hold.len() > 500);
    assert!(hold.windows(2).all(|w| w[1] - w[0] == 1));

    let settle = sink.samples().filter(|r| r.phase == StateId::Settle).count();
    assert_eq!(settle, 2000);

    assert!(sink
        .samples()
        .all(|r| matches!(r.payload, SamplePayload::LinearSpeed { .. })));
}

#[test]
fn linear_profile_survives_encoder_counter_wrap() {
    let config = RobotConfig::default();
    let mut hw = SimRobot::new(&config).near_wrap();
    let mut app = AppService::new(config, &hw);
    let mut sink = RecordingSink::new();

    let summary = app
        .run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap();
    // Both wheels travel the same distance; the wrap must not show.
    assert!((summary.left_counts - summary.right_counts).abs() <= 1);
}

#[test]
fn linear_hold_ends_at_the_first_poll_past_half_a_meter() {
    let (mut app, mut hw, mut sink) = default_setup();
    app.run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap();

    let last_hold = sink
        .samples()
        .filter(|r| r.phase == StateId::Hold)
        .map(|r| r.distance_um)
        .max()
        .unwrap();
    assert!(last_hold < 500_000, "hold sampled at {last_hold} µm");

    let exit = phase_exit_distance(&sink, StateId::Hold);
    assert!(exit >= 500_000, "hold left at {exit} µm");
    // One tick at 0.6 m/s is about 600 µm, give or take a count.
    assert!(exit - last_hold <= 620, "{last_hold} -> {exit}");
}

/// Distance logged when the run left `state`.
fn phase_exit_distance(sink: &RecordingSink, state: StateId) -> i64 {
    sink.events
        .iter()
        .find_map(|e| match e {
            AppEvent::PhaseChanged {
                from, distance_um, ..
            } if *from == state => Some(*distance_um),
            _ => None,
        })
        .unwrap()
}

// ── Angular profile / static turn ─────────────────────────────

#[test]
fn static_turn_finishes_on_schedule_with_expected_samples() {
    let (mut app, mut hw, mut sink) = default_setup();

    let summary = app
        .run_procedure(ProcedureId::StaticTurnRight, &mut hw, &mut sink)
        .unwrap();

    // 1000 baseline + 125 turning + 200 settle.
    assert_eq!(summary.ticks, 1325);
    assert_eq!(sink.samples().count(), 133);
    assert!(sink
        .samples()
        .all(|r| matches!(r.payload, SamplePayload::AngularSpeed { .. })));
    // Turning on the spot: wheels in opposite directions, no net travel.
    assert!(summary.right_counts > 0);
    assert!(summary.left_counts < 0);
    assert!(summary.travelled_um.abs() < 1_000);
}

#[test]
fn angular_profile_holds_for_three_half_turns() {
    let (mut app, mut hw, mut sink) = default_setup();

    let summary = app
        .run_procedure(ProcedureId::AngularSpeedProfile, &mut hw, &mut sink)
        .unwrap();

    // 1000 baseline + 750 turning + 2000 settle.
    assert_eq!(summary.ticks, 3750);
    let hold = sink.samples().filter(|r| r.phase == StateId::Hold).count();
    assert_eq!(hold, 75);
    let settle: Vec<u32> = sink
        .samples()
        .filter(|r| r.phase == StateId::Settle)
        .map(|r| r.tick)
        .collect();
    assert_eq!(settle.len(), 200);
    assert!(settle.windows(2).all(|w| w[1] - w[0] == 10));
}

// ── Micrometers per count ─────────────────────────────────────

#[test]
fn micrometers_per_count_run_restores_limits_and_calibrates() {
    let config = RobotConfig::default();
    let (mut app, mut hw, mut sink) = setup(config.clone());

    let summary = app
        .run_procedure(
            ProcedureId::MicrometersPerCount { cells: 3 },
            &mut hw,
            &mut sink,
        )
        .unwrap();

    // 503 mm accelerating + 132 mm decelerating, give or take a tick.
    assert!(
        (625_000..=645_000).contains(&summary.travelled_um),
        "travelled {}",
        summary.travelled_um
    );
    assert_eq!(hw.side_calibrations, 1);
    assert_eq!(hw.error_resets, 1);

    // Overrides are gone once the run is over.
    assert_eq!(hw.max_linear_speed(), config.max_linear_speed);
    assert_eq!(hw.linear_acceleration(), config.linear_acceleration);
    assert_eq!(hw.linear_deceleration(), config.linear_deceleration);

    let implied = summary
        .micrometers_per_count(summary.travelled_um as f32)
        .unwrap();
    assert!((implied - config.micrometers_per_count).abs() < 0.05);

    // No diagnostic logging in this procedure.
    assert_eq!(sink.samples().count(), 0);
    assert_eq!(
        sink.phase_changes(),
        vec![
            (StateId::Idle, StateId::RampUp),
            (StateId::RampUp, StateId::RampDown),
            (StateId::RampDown, StateId::Idle),
        ]
    );
}

#[test]
fn micrometers_per_count_zero_cells_is_rejected_before_motion() {
    let (mut app, mut hw, mut sink) = default_setup();
    let err = app
        .run_procedure(
            ProcedureId::MicrometersPerCount { cells: 0 },
            &mut hw,
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(hw.motion_calls, 0);
    assert!(sink.events.is_empty());
}

// ── Front sensors ─────────────────────────────────────────────

#[test]
fn front_sensor_run_logs_approach_to_wall() {
    let config = RobotConfig::default();
    let (mut app, mut hw, mut sink) = setup(config.clone());

    let summary = app
        .run_procedure(ProcedureId::FrontSensors, &mut hw, &mut sink)
        .unwrap();

    // Braking starts at 1.3 cells and adds 0.3² / (2 · 5) m on top.
    let brake_at = phase_exit_distance(&sink, StateId::Hold);
    assert!(
        (234_000..=234_400).contains(&brake_at),
        "braking started at {brake_at}"
    );
    assert!(
        (240_000..=250_000).contains(&summary.travelled_um),
        "travelled {}",
        summary.travelled_um
    );

    let hold: Vec<u16> = sink
        .samples()
        .filter(|r| r.phase == StateId::Hold)
        .map(|r| match r.payload {
            SamplePayload::FrontSensors { left_raw, .. } => left_raw,
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert!(hold.len() > 100);
    assert!(hold.last() > hold.first(), "readings rise towards the wall");

    let settle = sink.samples().filter(|r| r.phase == StateId::Settle).count();
    assert_eq!(settle, 100);
    assert_eq!(hw.linear_acceleration(), config.linear_acceleration);
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn stalled_sensor_frames_abort_front_calibration() {
    let config = RobotConfig::default();
    let (mut app, mut hw, mut sink) = setup(config.clone());
    hw.freeze_frames_at = Some(50);

    let err = app
        .run_procedure(ProcedureId::FrontSensors, &mut hw, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Hardware(HardwareFault::SensorStall { .. })
    ));
    assert_eq!(app.state(), StateId::Idle);
    assert!(!hw.enabled);
    assert_eq!(hw.linear_acceleration(), config.linear_acceleration);
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::ProcedureAborted { .. })
    ));
    assert_eq!(sink.phase_changes().last().map(|t| t.1), Some(StateId::Idle));
}

#[test]
fn stalled_frames_do_not_matter_without_sensor_logging() {
    let (mut app, mut hw, mut sink) = default_setup();
    hw.freeze_frames_at = Some(1);

    app.run_procedure(ProcedureId::StaticTurnRight, &mut hw, &mut sink)
        .unwrap();
}

#[test]
fn encoder_jump_aborts_with_timing_violation() {
    let config = RobotConfig::default();
    let (mut app, mut hw, mut sink) = setup(config.clone());
    hw.encoder_jump_at = Some((1200, 20_000));

    let err = app
        .run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Timing(TimingViolation::EncoderDelta { .. })
    ));
    assert!(!hw.enabled);
    assert_eq!(hw.max_linear_speed(), config.max_linear_speed);
    assert_eq!(app.state(), StateId::Idle);
}

#[test]
fn invalid_limits_fail_before_any_motion_command() {
    let (mut app, mut hw, mut sink) = default_setup();
    hw.set_max_linear_speed(0.0);
    let calls = hw.motion_calls;

    let err = app
        .run_procedure(ProcedureId::LinearSpeedProfile, &mut hw, &mut sink)
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(hw.motion_calls, calls);
    assert!(sink.events.is_empty());
}

#[test]
fn procedures_can_run_back_to_back() {
    let (mut app, mut hw, mut sink) = default_setup();
    app.run_procedure(ProcedureId::StaticTurnRight, &mut hw, &mut sink)
        .unwrap();
    let second = app
        .run_procedure(ProcedureId::StaticTurnRight, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(second.ticks, 1325);
}
