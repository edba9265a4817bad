//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the logger
//! (UART / USB-CDC in production).  Diagnostic samples are rendered as one
//! JSON object per line so a run can be captured and plotted offline.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Sample(record) => match serde_json::to_string(record) {
                Ok(line) => info!("SAMPLE | {}", line),
                Err(e) => warn!("SAMPLE | unserialisable record: {}", e),
            },
            AppEvent::PhaseChanged {
                procedure,
                from,
                to,
                tick,
                distance_um,
            } => {
                info!(
                    "PHASE | {} {:?} -> {:?} @ tick {} ({} µm)",
                    procedure, from, to, tick, distance_um
                );
            }
            AppEvent::ProcedureStarted(procedure) => {
                info!("RUN | {} started", procedure);
            }
            AppEvent::ProcedureFinished(summary) => {
                info!(
                    "RUN | {} finished | ticks={} travelled={}µm counts L={} R={} \
                     avg={:.1} max_delta={}",
                    summary.procedure,
                    summary.ticks,
                    summary.travelled_um,
                    summary.left_counts,
                    summary.right_counts,
                    summary.average_counts(),
                    summary.max_delta_counts,
                );
            }
            AppEvent::ProcedureAborted { procedure, error } => {
                error!("RUN | {} aborted: {}", procedure, error);
            }
            AppEvent::Profiling(report) => {
                info!(
                    "PROFILE | {} transforms in {} ticks (budget {}) | FL={:.3}m FR={:.3}m",
                    report.iterations,
                    report.ticks,
                    report.budget_ticks,
                    report.last.front_left,
                    report.last.front_right,
                );
            }
            AppEvent::SensorFrame(frame) => {
                info!(
                    "SENSORS | S1={} S2={} S3={} S4={} seq={}",
                    frame.side_left,
                    frame.side_right,
                    frame.front_left,
                    frame.front_right,
                    frame.sequence,
                );
            }
        }
    }
}
