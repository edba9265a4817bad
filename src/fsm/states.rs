//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.  The run phases share one generic body driven by the
//! plan's [`Phase`](crate::calibration::Phase) for that state.
//!
//! ```text
//!  IDLE ──[begin]──▶ BASELINE ──▶ RAMP_UP ──▶ HOLD ──▶ RAMP_DOWN ──▶ SETTLE
//!    ▲                (optional)               (optional)             (optional)
//!    │                                                                    │
//!    └────────────────────────[plan exhausted / abort]────────────────────┘
//! ```

use log::{debug, info};

use super::context::{MotionSnapshot, RampStage, Sampler, SequencerContext};
use super::{StateDescriptor, StateId};
use crate::calibration::{Command, LinearTarget, MotionAction, Transition};

/// Slack when comparing the ideal speed against a braking target (m/s).
const SPEED_EPSILON: f32 = 1e-3;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per sequencer.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: Some(idle_exit),
            on_update: idle_update,
        },
        // Index 1 — Baseline
        StateDescriptor {
            id: StateId::Baseline,
            name: "Baseline",
            on_enter: Some(baseline_enter),
            on_exit: None,
            on_update: baseline_update,
        },
        // Index 2 — RampUp
        StateDescriptor {
            id: StateId::RampUp,
            name: "RampUp",
            on_enter: Some(ramp_up_enter),
            on_exit: None,
            on_update: ramp_up_update,
        },
        // Index 3 — Hold
        StateDescriptor {
            id: StateId::Hold,
            name: "Hold",
            on_enter: Some(hold_enter),
            on_exit: None,
            on_update: hold_update,
        },
        // Index 4 — RampDown
        StateDescriptor {
            id: StateId::RampDown,
            name: "RampDown",
            on_enter: Some(ramp_down_enter),
            on_exit: None,
            on_update: ramp_down_update,
        },
        // Index 5 — Settle
        StateDescriptor {
            id: StateId::Settle,
            name: "Settle",
            on_enter: Some(settle_enter),
            on_exit: Some(settle_exit),
            on_update: settle_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut SequencerContext) {
    // Reached at the end of a run (or on abort): leave the robot stopped.
    let Some(plan) = ctx.plan else {
        return;
    };
    for action in plan.exit {
        ctx.queue(*action);
    }
    ctx.queue(MotionAction::ResetMotion);
    ctx.sampler = None;
    ctx.ramp = RampStage::None;
    ctx.finished = true;
    info!(
        "IDLE: {} done after {} ticks",
        plan.procedure,
        crate::clock::elapsed(ctx.run_start_tick, ctx.now)
    );
}

fn idle_exit(ctx: &mut SequencerContext) {
    let Some(plan) = ctx.plan else {
        return;
    };
    for action in plan.entry {
        ctx.queue(*action);
    }
    if plan.entry.contains(&MotionAction::ResetMotion) {
        // The queued reset rebases the tracker before the next poll, so
        // the first phase measures from zero.
        ctx.distance_um = 0;
        ctx.motion = MotionSnapshot::default();
    }
    ctx.run_start_tick = ctx.now;
    ctx.finished = false;
    info!("IDLE: starting {}", plan.procedure);
}

fn idle_update(ctx: &mut SequencerContext) -> Option<StateId> {
    if !ctx.start_requested {
        return None;
    }
    ctx.start_requested = false;
    ctx.plan.map(|plan| plan.first_state())
}

// ═══════════════════════════════════════════════════════════════════════════
//  Run phases
// ═══════════════════════════════════════════════════════════════════════════

fn baseline_enter(ctx: &mut SequencerContext) {
    enter_phase(ctx, StateId::Baseline);
}

fn baseline_update(ctx: &mut SequencerContext) -> Option<StateId> {
    update_phase(ctx, StateId::Baseline)
}

fn ramp_up_enter(ctx: &mut SequencerContext) {
    enter_phase(ctx, StateId::RampUp);
}

fn ramp_up_update(ctx: &mut SequencerContext) -> Option<StateId> {
    update_phase(ctx, StateId::RampUp)
}

fn hold_enter(ctx: &mut SequencerContext) {
    enter_phase(ctx, StateId::Hold);
}

fn hold_update(ctx: &mut SequencerContext) -> Option<StateId> {
    update_phase(ctx, StateId::Hold)
}

fn ramp_down_enter(ctx: &mut SequencerContext) {
    enter_phase(ctx, StateId::RampDown);
}

fn ramp_down_update(ctx: &mut SequencerContext) -> Option<StateId> {
    update_phase(ctx, StateId::RampDown)
}

fn settle_enter(ctx: &mut SequencerContext) {
    enter_phase(ctx, StateId::Settle);
}

fn settle_exit(ctx: &mut SequencerContext) {
    debug!(
        "SETTLE: {} µm travelled after stop command",
        ctx.travelled()
    );
}

fn settle_update(ctx: &mut SequencerContext) -> Option<StateId> {
    update_phase(ctx, StateId::Settle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared phase body
// ═══════════════════════════════════════════════════════════════════════════

fn enter_phase(ctx: &mut SequencerContext, state: StateId) {
    let Some(phase) = ctx.phase(state) else {
        return;
    };
    ctx.phase_start_tick = ctx.now;
    ctx.phase_start_um = ctx.distance_um;
    ctx.entry_braking_um = ctx.motion.braking_micrometers as i64;
    ctx.ramp = RampStage::None;

    for action in phase.actions {
        ctx.queue(*action);
    }
    match phase.command {
        Command::Keep => {}
        Command::Speeds { linear, angular } => {
            ctx.queue(MotionAction::SetAngularSpeed(angular));
            ctx.queue(MotionAction::SetLinearSpeed(linear));
        }
        Command::Accelerate { distance_um } => {
            ctx.queue(MotionAction::SetLinearSpeed(LinearTarget::Max));
            ctx.ramp = RampStage::Accelerating { distance_um };
        }
        Command::Decelerate {
            distance_um,
            final_speed,
        } => {
            ctx.ramp = RampStage::Cruising {
                distance_um,
                final_speed,
            };
        }
    }
    ctx.sampler = phase.log.map(|log| Sampler::new(log, ctx.now));
    debug!("{:?}: entered at tick {} ({} µm)", state, ctx.now, ctx.distance_um);
}

fn update_phase(ctx: &mut SequencerContext, state: StateId) -> Option<StateId> {
    let Some(phase) = ctx.phase(state) else {
        return Some(ctx.next_after(state));
    };

    advance_ramp(ctx);

    if transition_met(ctx, phase.until) {
        return Some(ctx.next_after(state));
    }

    let now = ctx.now;
    if let Some(signal) = ctx.sampler.as_mut().and_then(|s| s.poll(now)) {
        ctx.request_sample(state, signal);
    }
    None
}

fn advance_ramp(ctx: &mut SequencerContext) {
    match ctx.ramp {
        RampStage::Accelerating { distance_um } => {
            if ctx.travelled() >= distance_um {
                ctx.ramp = RampStage::Done;
            }
        }
        RampStage::Cruising {
            distance_um,
            final_speed,
        } => {
            let braking = ctx.motion.braking_micrometers as i64;
            if ctx.travelled() >= distance_um - braking {
                ctx.queue(MotionAction::SetLinearSpeed(LinearTarget::Speed(final_speed)));
                ctx.ramp = RampStage::Braking { final_speed };
            }
        }
        RampStage::Braking { final_speed } => {
            if ctx.motion.ideal_linear_speed <= final_speed + SPEED_EPSILON {
                ctx.ramp = RampStage::Done;
            }
        }
        RampStage::None | RampStage::Done => {}
    }
}

fn transition_met(ctx: &SequencerContext, until: Transition) -> bool {
    match until {
        Transition::Immediate => true,
        Transition::Elapsed(ticks) => ctx.phase_elapsed() >= ticks,
        Transition::Travelled(distance) => ctx.travelled() >= distance,
        Transition::StoppingPoint(distance) => ctx.travelled() >= distance - ctx.entry_braking_um,
        Transition::RampComplete => ctx.ramp == RampStage::Done,
    }
}
