//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to the console, buffer for a
//! test, stream to a host.

use serde::Serialize;

use crate::calibration::ProcedureId;
use crate::error::Error;
use crate::fsm::StateId;
use crate::sensors::{SensorDistances, SensorFrame};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// One diagnostic sample taken during a procedure.
    Sample(DiagnosticRecord),

    /// The sequencer moved between phases.
    PhaseChanged {
        procedure: ProcedureId,
        from: StateId,
        to: StateId,
        tick: u32,
        distance_um: i64,
    },

    ProcedureStarted(ProcedureId),

    ProcedureFinished(RunSummary),

    /// The run stopped on a fault; the robot has been brought to rest.
    ProcedureAborted { procedure: ProcedureId, error: Error },

    Profiling(ProfilingReport),

    /// Periodic raw rangefinder report outside a procedure.
    SensorFrame(SensorFrame),
}

/// One logged sample: the signal group the phase asked for, stamped with
/// where and when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub tick: u32,
    pub procedure: ProcedureId,
    pub phase: StateId,
    /// Average wheel distance since the start of the run (µm).
    pub distance_um: i64,
    pub payload: SamplePayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SamplePayload {
    LinearSpeed { ideal: f32, measured: f32 },
    AngularSpeed { ideal: f32, measured: f32 },
    FrontSensors {
        left_raw: u16,
        right_raw: u16,
        left_m: f32,
        right_m: f32,
    },
}

/// Totals of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub procedure: ProcedureId,
    pub ticks: u32,
    pub travelled_um: i64,
    pub left_counts: i64,
    pub right_counts: i64,
    /// Largest per-poll encoder delta seen (counts).
    pub max_delta_counts: u16,
}

impl RunSummary {
    pub fn average_counts(&self) -> f32 {
        (self.left_counts + self.right_counts) as f32 / 2.0
    }

    /// Calibration constant implied by a tape-measured run length.
    pub fn micrometers_per_count(&self, measured_um: f32) -> Option<f32> {
        let counts = self.average_counts();
        (counts.abs() > 0.0).then(|| measured_um / counts)
    }
}

/// Result of the distance-transform throughput probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfilingReport {
    pub iterations: u32,
    pub ticks: u32,
    pub budget_ticks: u32,
    pub last: SensorDistances,
}
