//! Function-pointer finite state machine engine for tube actuation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌─────────────┬──────────┬──────────┬───────────────────┐   │
//! │  │ StateId     │ on_enter │ on_exit  │ on_update         │   │
//! │  ├─────────────┼──────────┼──────────┼───────────────────┤   │
//! │  │ Idle        │ fn(ctx)  │ -        │ fn(ctx)->Option<> │   │
//! │  │ Opening     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Stabilizing │ fn(ctx)  │ -        │ fn(ctx)->Option<> │   │
//! │  │ Sensing     │ -        │ -        │ fn(ctx)->Option<> │   │
//! │  │ Stopping    │ fn(ctx)  │ -        │ fn(ctx)->Option<> │   │
//! │  │ Closing     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └─────────────┴──────────┴──────────┴───────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Time in state is measured in milliseconds from
//! `DispenseContext::now_ms`, so the handlers never block.

pub mod context;
pub mod states;

use context::DispenseContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Actuation states for one tube.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Opening = 1,
    Stabilizing = 2,
    Sensing = 3,
    Stopping = 4,
    Closing = 5,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to `StateId`.  Out-of-range indices fall back
    /// to `Stopping`, which switches the motor off.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Opening,
            2 => Self::Stabilizing,
            3 => Self::Sensing,
            4 => Self::Stopping,
            5 => Self::Closing,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Stopping
            }
        }
    }

    /// States in which a feed motor may legitimately run.
    pub fn motor_allowed(self) -> bool {
        matches!(self, Self::Stabilizing | Self::Sensing)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut DispenseContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut DispenseContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
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
    /// `now_ms` at which the current state was entered.
    state_entry_ms: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
            state_entry_ms: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut DispenseContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        self.state_entry_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  `ctx.now_ms` must be set first.
    pub fn tick(&mut self, ctx: &mut DispenseContext) {
        ctx.ms_in_state = ctx.now_ms.saturating_sub(self.state_entry_ms);

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition (used by the actuation guard to
    /// drop back to `Idle`).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut DispenseContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut DispenseContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_ms = ctx.now_ms;
        ctx.ms_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
