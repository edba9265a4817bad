//! Calibration sequencer: a state machine plus its blackboard, stepped once
//! per scheduling-loop iteration.

use heapless::Vec;

use super::context::{
    ACTION_CAPACITY, MotionSnapshot, SAMPLE_CAPACITY, SequencerContext, TRANSITION_CAPACITY,
};
use super::states::build_state_table;
use super::{Fsm, StateId};
use crate::app::ports::MotionPort;
use crate::calibration::{MotionAction, ProcedurePlan, Signal};
use crate::error::Error;

/// Everything one step produced, in the order it happened.
#[derive(Debug, Default)]
pub struct StepOutput {
    /// To be applied to the motion controller in order.
    pub actions: Vec<MotionAction, ACTION_CAPACITY>,
    /// Samples to log, tagged with the phase that asked for them.
    pub samples: Vec<(StateId, Signal), SAMPLE_CAPACITY>,
    pub transitions: Vec<(StateId, StateId), TRANSITION_CAPACITY>,
    /// The run reached Idle during this step.
    pub finished: bool,
}

pub struct Sequencer {
    fsm: Fsm,
    ctx: SequencerContext,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: SequencerContext::new(),
        }
    }

    /// Arm `plan`; the first step leaves Idle.
    pub fn begin(&mut self, plan: ProcedurePlan) -> Result<(), Error> {
        if self.is_running() {
            return Err(Error::Config("a procedure is already running"));
        }
        self.ctx.plan = Some(plan);
        self.ctx.start_requested = true;
        self.ctx.finished = false;
        Ok(())
    }

    /// Run one iteration at tick `now` with the tracker's average distance.
    pub fn step(&mut self, now: u32, distance_um: i64, motion: &impl MotionPort) -> StepOutput {
        self.load_inputs(now, distance_um, motion);
        self.fsm.tick(&mut self.ctx);
        self.drain()
    }

    /// Drop back to Idle from wherever the run is, issuing the stop actions.
    /// Nothing happens when already idle.
    pub fn abort(&mut self, now: u32, distance_um: i64) -> StepOutput {
        self.ctx.now = now;
        self.ctx.distance_um = distance_um;
        self.ctx.start_requested = false;
        self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        self.drain()
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.start_requested || self.state() != StateId::Idle
    }

    /// Plan of the current (or last) run.
    pub fn plan(&self) -> Option<&ProcedurePlan> {
        self.ctx.plan.as_ref()
    }

    pub fn ticks_in_state(&self) -> u64 {
        self.fsm.ticks_in_current_state()
    }

    fn load_inputs(&mut self, now: u32, distance_um: i64, motion: &impl MotionPort) {
        let final_speed = self.ctx.plan.map_or(0.0, |p| p.final_speed());
        self.ctx.now = now;
        self.ctx.distance_um = distance_um;
        self.ctx.motion = MotionSnapshot {
            ideal_linear_speed: motion.ideal_linear_speed(),
            braking_micrometers: motion.required_micrometers_to_speed(final_speed),
        };
    }

    fn drain(&mut self) -> StepOutput {
        let finished = self.ctx.finished;
        self.ctx.finished = false;
        StepOutput {
            actions: core::mem::take(&mut self.ctx.actions),
            samples: core::mem::take(&mut self.ctx.samples),
            transitions: core::mem::take(&mut self.ctx.transitions),
            finished,
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
