//! Function-pointer finite state machine engine for calibration runs.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌──────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update         │   │
//! │  ├──────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Idle     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Baseline │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ RampUp   │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ Hold     │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ RampDown │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ Settle   │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └──────────┴───────────┴──────────┴───────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  If it
//! returns `Some(next_id)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, and immediately runs the new
//! state's `on_update` as well, so a chain of instant phases completes
//! within one tick.  The chain is bounded by the number of states.

pub mod context;
pub mod sequencer;
pub mod states;

use context::SequencerContext;
use log::info;
use serde::{Deserialize, Serialize};

pub use sequencer::{Sequencer, StepOutput};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Phases of a calibration run.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    /// Pre-roll with the robot still, logging the quiescent signal.
    Baseline = 1,
    RampUp = 2,
    Hold = 3,
    RampDown = 4,
    Settle = 5,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 6;

    /// Order in which a run visits its phases.
    pub const RUN_ORDER: [StateId; 5] = [
        Self::Baseline,
        Self::RampUp,
        Self::Hold,
        Self::RampDown,
        Self::Settle,
    ];

    /// Convert an index back to `StateId`.  Out-of-range indices map to
    /// `Idle` (asserts in debug builds).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Baseline,
            2 => Self::RampUp,
            3 => Self::Hold,
            4 => Self::RampDown,
            5 => Self::Settle,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SequencerContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut SequencerContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, resting in `initial`.
    /// The initial state is not entered; its `on_enter` only runs when a
    /// later transition leads back to it.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Advance the FSM by one tick, following any chain of transitions.
    pub fn tick(&mut self, ctx: &mut SequencerContext) {
        self.tick_count += 1;
        for _ in 0..StateId::COUNT {
            let Some(next_id) = (self.table[self.current].on_update)(ctx) else {
                break;
            };
            if next_id as usize == self.current {
                break;
            }
            self.transition(next_id, ctx);
        }
    }

    /// Jump to `next` regardless of what `on_update` would return (used to
    /// abort a run).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut SequencerContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut SequencerContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        ctx.record_transition(self.current_state(), next_id);
        self.current = next_idx;
        self.state_entry_tick = self.tick_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
