//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the encoder tracker, the calibration sequencer and
//! the sensor helpers.  It exposes a clean, hardware-agnostic API.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with a simulated robot.
//!
//! ```text
//!  EncoderPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  SensorPort  ──▶ │          AppService          │
//!  ClockPort   ◀──▶│ Tracker · Sequencer · Stall  │
//!  MotionPort  ◀── └──────────────────────────────┘ ◀──▶ ConfigPort
//! ```
//!
//! A procedure runs as one scheduling loop: every tick the tracker is
//! polled, the controller fed, the sequencer stepped and its actions
//! applied, then the loop sleeps until the next tick.

use log::{error, info, warn};

use crate::calibration::{
    LimitsOverride, LinearTarget, MotionAction, MotionLimits, ProcedureId, ProcedurePlan, Signal,
};
use crate::clock::elapsed;
use crate::config::RobotConfig;
use crate::encoder::{EncoderDistanceTracker, Wheel};
use crate::error::{Error, TimingViolation};
use crate::fsm::{Sequencer, StateId};
use crate::periodic::each;
use crate::sensors::{DistanceEstimator, SensorDistances, SensorFrame, StallMonitor};

use super::commands::AppCommand;
use super::events::{AppEvent, DiagnosticRecord, ProfilingReport, RunSummary, SamplePayload};
use super::ports::{
    ClockPort, ConfigPort, EncoderPort, EventSink, MotionPort, RobotHw, SensorPort,
};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    config: RobotConfig,
    tracker: EncoderDistanceTracker,
    sequencer: Sequencer,
    estimator: DistanceEstimator,
    stall: StallMonitor,
}

impl AppService {
    /// Construct the service from configuration.  The tracker takes the
    /// current counter values as its baseline.
    pub fn new(config: RobotConfig, encoders: &impl EncoderPort) -> Self {
        Self {
            tracker: EncoderDistanceTracker::new(&config, encoders),
            sequencer: Sequencer::new(),
            estimator: DistanceEstimator::new(config.sensor_calibration),
            stall: StallMonitor::new(config.sensor_stall_ticks),
            config,
        }
    }

    // ── Procedures ────────────────────────────────────────────

    /// Run `procedure` to completion, blocking the caller.
    ///
    /// Parameters are validated before the robot is touched.  On any fault
    /// the robot is stopped, the limits restored and the error returned.
    pub fn run_procedure(
        &mut self,
        procedure: ProcedureId,
        hw: &mut impl RobotHw,
        sink: &mut impl EventSink,
    ) -> Result<RunSummary, Error> {
        let plan = ProcedurePlan::build(procedure, &self.config, MotionLimits::read(&*hw))?;

        let result = {
            let mut guard = LimitsOverride::apply(hw, plan.limits);
            let hw = &mut *guard;

            self.stall.rearm();
            self.tracker.reset(&*hw);
            self.sequencer.begin(plan)?;
            sink.emit(&AppEvent::ProcedureStarted(procedure));
            info!("Procedure {} started", procedure);

            let result = self.drive(&plan, hw, sink);
            if result.is_err() {
                let now = hw.ticks();
                let distance = self.tracker.average_micrometers();
                let out = self.sequencer.abort(now, distance);
                self.emit_transitions(procedure, &out.transitions, now, distance, sink);
                self.apply_actions(&out.actions, hw);
            }
            result
        };

        match result {
            Ok(summary) => {
                info!(
                    "Procedure {} finished: {} ticks, {} µm, counts L={} R={}",
                    procedure,
                    summary.ticks,
                    summary.travelled_um,
                    summary.left_counts,
                    summary.right_counts
                );
                sink.emit(&AppEvent::ProcedureFinished(summary));
                Ok(summary)
            }
            Err(error) => {
                error!("Procedure {} aborted: {}", procedure, error);
                sink.emit(&AppEvent::ProcedureAborted { procedure, error });
                Err(error)
            }
        }
    }

    /// The scheduling loop.  Returns once the sequencer is back in Idle.
    fn drive<H: RobotHw>(
        &mut self,
        plan: &ProcedurePlan,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Result<RunSummary, Error> {
        let start = hw.ticks();
        let needs_sensors = plan.needs_sensors();

        loop {
            let now = hw.ticks();

            self.tracker.poll(&*hw)?;
            let (left_um, right_um) = self.tracker.last_delta_micrometers();
            hw.on_odometry(left_um, right_um);

            let frame = hw.frame();
            hw.on_frame(&frame);
            if needs_sensors {
                self.stall.observe(frame.sequence, now)?;
            }

            let distance = self.tracker.average_micrometers();
            let out = self.sequencer.step(now, distance, &*hw);

            for (phase, signal) in &out.samples {
                let record = DiagnosticRecord {
                    tick: now,
                    procedure: plan.procedure,
                    phase: *phase,
                    distance_um: distance,
                    payload: self.sample(*signal, &*hw, &frame),
                };
                sink.emit(&AppEvent::Sample(record));
            }
            self.emit_transitions(plan.procedure, &out.transitions, now, distance, sink);

            if out.finished {
                // Summarise before ResetMotion rebases the tracker.
                let summary = RunSummary {
                    procedure: plan.procedure,
                    ticks: elapsed(start, now),
                    travelled_um: distance,
                    left_counts: self.tracker.counts(Wheel::Left),
                    right_counts: self.tracker.counts(Wheel::Right),
                    max_delta_counts: self.tracker.max_observed_delta(),
                };
                self.apply_actions(&out.actions, hw);
                return Ok(summary);
            }

            self.apply_actions(&out.actions, hw);
            hw.sleep_ticks(1);
        }
    }

    fn sample(&mut self, signal: Signal, hw: &impl MotionPort, frame: &SensorFrame) -> SamplePayload {
        match signal {
            Signal::LinearSpeed => SamplePayload::LinearSpeed {
                ideal: hw.ideal_linear_speed(),
                measured: hw.measured_linear_speed(),
            },
            Signal::AngularSpeed => SamplePayload::AngularSpeed {
                ideal: hw.ideal_angular_speed(),
                measured: hw.measured_angular_speed(),
            },
            Signal::FrontSensors => {
                let distances = self.estimator.update(frame);
                SamplePayload::FrontSensors {
                    left_raw: frame.front_left,
                    right_raw: frame.front_right,
                    left_m: distances.front_left,
                    right_m: distances.front_right,
                }
            }
        }
    }

    /// Translate queued sequencer actions into port calls.
    fn apply_actions<H: MotionPort + EncoderPort>(&mut self, actions: &[MotionAction], hw: &mut H) {
        for action in actions {
            match *action {
                MotionAction::EnableMotorControl => hw.enable_motor_control(),
                MotionAction::DisableMotorControl => hw.disable_motor_control(),
                MotionAction::SideSensorsControl(on) => hw.side_sensors_control(on),
                MotionAction::FrontSensorsControl(on) => hw.front_sensors_control(on),
                MotionAction::DisableWallsControl => hw.disable_walls_control(),
                MotionAction::SideSensorsCalibration => hw.side_sensors_calibration(),
                MotionAction::SetLinearSpeed(LinearTarget::Speed(speed)) => {
                    hw.set_target_linear_speed(speed);
                }
                MotionAction::SetLinearSpeed(LinearTarget::Max) => {
                    let max = hw.max_linear_speed();
                    hw.set_target_linear_speed(max);
                }
                MotionAction::SetAngularSpeed(speed) => hw.set_target_angular_speed(speed),
                MotionAction::ResetMotion => {
                    hw.reset_motion();
                    self.tracker.reset(&*hw);
                }
                MotionAction::ResetControlErrors => hw.reset_control_errors(),
            }
        }
    }

    fn emit_transitions(
        &self,
        procedure: ProcedureId,
        transitions: &[(StateId, StateId)],
        tick: u32,
        distance_um: i64,
        sink: &mut impl EventSink,
    ) {
        for (from, to) in transitions {
            sink.emit(&AppEvent::PhaseChanged {
                procedure,
                from: *from,
                to: *to,
                tick,
                distance_um,
            });
        }
    }

    // ── Probes ────────────────────────────────────────────────

    /// Time `profiling_iterations` sensor reads, each followed by its
    /// distance transform.  Fails if they took longer than the configured
    /// budget.
    pub fn profile_distances<H: SensorPort + ClockPort>(
        &mut self,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Result<ProfilingReport, Error> {
        let iterations = self.config.profiling_iterations;
        let budget = self.config.profiling_budget_ticks;

        let start = hw.ticks();
        let mut last = SensorDistances::default();
        for _ in 0..iterations {
            let frame = hw.frame();
            last = self.estimator.update(core::hint::black_box(&frame));
        }
        let ticks = elapsed(start, hw.ticks());

        let report = ProfilingReport {
            iterations,
            ticks,
            budget_ticks: budget,
            last,
        };
        sink.emit(&AppEvent::Profiling(report));
        info!("Profiling: {} transforms in {} ticks", iterations, ticks);

        if ticks > budget {
            warn!("Profiling over budget ({} > {})", ticks, budget);
            return Err(TimingViolation::ProfilingBudget { ticks, budget }.into());
        }
        Ok(report)
    }

    /// Emit a raw frame every `sensor_report_interval_ticks` for `ticks`.
    pub fn stream_sensors<H: SensorPort + ClockPort>(
        &mut self,
        hw: &mut H,
        ticks: u32,
        sink: &mut impl EventSink,
    ) {
        let interval = self.config.sensor_report_interval_ticks;
        each(hw, interval, ticks, |hw| {
            sink.emit(&AppEvent::SensorFrame(hw.frame()));
        });
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (console line, test harness).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl RobotHw,
        sink: &mut impl EventSink,
        store: &impl ConfigPort,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::Run(procedure) => self.run_procedure(procedure, hw, sink).map(drop),
            AppCommand::ProfileDistances => self.profile_distances(hw, sink).map(drop),
            AppCommand::StreamSensors { ticks } => {
                self.stream_sensors(hw, ticks, sink);
                Ok(())
            }
            AppCommand::UpdateConfig(config) => self.apply_config(config, hw),
            AppCommand::SaveConfig => {
                store.save(&self.config)?;
                info!("Configuration saved");
                Ok(())
            }
            AppCommand::SetMicrometersPerCount(value) => {
                let config = RobotConfig {
                    micrometers_per_count: value,
                    ..self.config.clone()
                };
                self.apply_config(config, hw)
            }
        }
    }

    /// Validate and adopt `config`.  The old config stays in force if the
    /// new one is rejected.
    pub fn apply_config<H: MotionPort + EncoderPort>(
        &mut self,
        config: RobotConfig,
        hw: &mut H,
    ) -> Result<(), Error> {
        if self.sequencer.is_running() {
            return Err(Error::Config("cannot change config during a procedure"));
        }
        config.validate()?;

        hw.set_linear_acceleration(config.linear_acceleration);
        hw.set_linear_deceleration(config.linear_deceleration);
        hw.set_max_linear_speed(config.max_linear_speed);

        self.tracker = EncoderDistanceTracker::new(&config, &*hw);
        self.estimator.set_calibration(config.sensor_calibration);
        self.stall = StallMonitor::new(config.sensor_stall_ticks);
        self.config = config;
        info!(
            "Configuration updated ({} µm/count)",
            self.config.micrometers_per_count
        );
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn tracker(&self) -> &EncoderDistanceTracker {
        &self.tracker
    }

    /// Current sequencer phase.
    pub fn state(&self) -> StateId {
        self.sequencer.state()
    }
}
