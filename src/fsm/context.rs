//! Shared mutable context threaded through every state handler.
//!
//! The blackboard between the scheduling loop and the handlers: the loop
//! writes the inputs before each tick, handlers read them and queue motion
//! actions and sample requests, and the loop drains the outputs after the
//! tick.  Handlers never touch a port.

use heapless::Vec;
use log::warn;

use crate::calibration::{
    Cadence, LogCadence, MotionAction, Phase, ProcedurePlan, Signal,
};
use crate::clock::elapsed;
use crate::periodic::{Due, PeriodicTask};

use super::StateId;

pub const ACTION_CAPACITY: usize = 24;
pub const SAMPLE_CAPACITY: usize = 8;
pub const TRANSITION_CAPACITY: usize = 8;

/// Controller state sampled before each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSnapshot {
    pub ideal_linear_speed: f32,
    /// Distance needed to brake to the plan's final speed (µm).
    pub braking_micrometers: f32,
}

/// Progress of an `Accelerate`/`Decelerate` phase command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampStage {
    None,
    Accelerating { distance_um: i64 },
    Cruising { distance_um: i64, final_speed: f32 },
    Braking { final_speed: f32 },
    Done,
}

/// Sample schedule of the current phase.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    signal: Signal,
    task: Option<PeriodicTask>,
}

impl Sampler {
    pub fn new(log: LogCadence, now: u32) -> Self {
        let task = match log.cadence {
            Cadence::EveryPoll => None,
            Cadence::Ticks(interval) => Some(PeriodicTask::unbounded(now, interval)),
        };
        Self {
            signal: log.signal,
            task,
        }
    }

    /// Signal to log this poll, if due.
    pub fn poll(&mut self, now: u32) -> Option<Signal> {
        match &mut self.task {
            None => Some(self.signal),
            Some(task) => (task.poll(now) == Due::Fire).then_some(self.signal),
        }
    }
}

pub struct SequencerContext {
    // -- Inputs (written before each tick) --
    pub now: u32,
    /// Average wheel distance since the last motion reset (µm).
    pub distance_um: i64,
    pub motion: MotionSnapshot,

    // -- Run --
    pub plan: Option<ProcedurePlan>,
    pub start_requested: bool,
    pub run_start_tick: u32,

    // -- Current phase --
    pub phase_start_tick: u32,
    pub phase_start_um: i64,
    /// Braking distance sampled when the phase was entered (µm).
    pub entry_braking_um: i64,
    pub sampler: Option<Sampler>,
    pub ramp: RampStage,

    // -- Outputs (drained after each tick) --
    pub actions: Vec<MotionAction, ACTION_CAPACITY>,
    pub samples: Vec<(StateId, Signal), SAMPLE_CAPACITY>,
    pub transitions: Vec<(StateId, StateId), TRANSITION_CAPACITY>,
    pub finished: bool,
}

impl SequencerContext {
    pub fn new() -> Self {
        Self {
            now: 0,
            distance_um: 0,
            motion: MotionSnapshot::default(),
            plan: None,
            start_requested: false,
            run_start_tick: 0,
            phase_start_tick: 0,
            phase_start_um: 0,
            entry_braking_um: 0,
            sampler: None,
            ramp: RampStage::None,
            actions: Vec::new(),
            samples: Vec::new(),
            transitions: Vec::new(),
            finished: false,
        }
    }

    /// Copy of the plan's phase for `state`.
    pub fn phase(&self, state: StateId) -> Option<Phase> {
        self.plan.as_ref().and_then(|p| p.phase(state).copied())
    }

    pub fn next_after(&self, state: StateId) -> StateId {
        self.plan
            .as_ref()
            .map_or(StateId::Idle, |p| p.next_after(state))
    }

    /// Ticks since the current phase started.
    pub fn phase_elapsed(&self) -> u32 {
        elapsed(self.phase_start_tick, self.now)
    }

    /// Distance covered since the current phase started (µm).
    pub fn travelled(&self) -> i64 {
        self.distance_um - self.phase_start_um
    }

    pub fn queue(&mut self, action: MotionAction) {
        if self.actions.push(action).is_err() {
            warn!("Sequencer: action queue full, dropped {:?}", action);
        }
    }

    pub fn request_sample(&mut self, state: StateId, signal: Signal) {
        if self.samples.push((state, signal)).is_err() {
            warn!("Sequencer: sample queue full, dropped {:?}", signal);
        }
    }

    pub fn record_transition(&mut self, from: StateId, to: StateId) {
        if self.transitions.push((from, to)).is_err() {
            warn!("Sequencer: transition log full ({:?} -> {:?})", from, to);
        }
    }
}

impl Default for SequencerContext {
    fn default() -> Self {
        Self::new()
    }
}
