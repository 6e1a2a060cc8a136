//! Function-pointer tick scheduler.
//!
//! One pass through the phase table per RTC tick:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SLEEP ─▶ TX0 ─▶ UI ─▶ TX1 ─▶ MINUTE ─▶ TX2 ─▶ STATUS ─▶ TX3 │
//! │    ▲                                                     │   │
//! │    └──────────── (overrun check) ◀──── CLI ◀─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each phase is a row of plain `fn` pointers. `on_update` does the
//! phase's work and names the phase that follows; the engine runs
//! `on_exit` for the old phase and `on_enter` for the new one. The
//! overrun check is the CLI phase's `on_exit`, so it runs exactly once
//! per tick however late the tick is.
//!
//! SLEEP does the pre-sleep work (tick flags, hub listening, boiler
//! output) and then blocks until the next tick boundary. A tick is one
//! [`Scheduler::run_tick`] call and ends when the table is back at SLEEP.

pub mod context;
pub mod hub;
pub mod minute_tasks;
pub mod phases;

use log::{debug, info, trace};

use crate::app::ports::Platform;

use context::TickContext;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// The phases of one tick, in order.
/// Must stay in sync with the table built in [`phases::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TickPhase {
    Sleep = 0,
    TxWindow0 = 1,
    UiPoll = 2,
    TxWindow1 = 3,
    MinuteTask = 4,
    TxWindow2 = 5,
    StatusReport = 6,
    TxWindow3 = 7,
    CliPoll = 8,
}

impl TickPhase {
    /// Total number of phases, used to size the table array.
    pub const COUNT: usize = 9;

    /// Convert an index back to a `TickPhase`. Out-of-range indices map to
    /// `Sleep` so a corrupt index can only end the tick early.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Sleep,
            1 => Self::TxWindow0,
            2 => Self::UiPoll,
            3 => Self::TxWindow1,
            4 => Self::MinuteTask,
            5 => Self::TxWindow2,
            6 => Self::StatusReport,
            7 => Self::TxWindow3,
            8 => Self::CliPoll,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Sleep
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action, run once per transition.
pub type PhaseActionFn<P> = fn(&mut TickContext<'_, P>);

/// Phase body. Returns the phase that follows.
pub type PhaseUpdateFn<P> = fn(&mut TickContext<'_, P>) -> TickPhase;

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct PhaseDescriptor<P> {
    pub id: TickPhase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn<P>>,
    pub on_exit: Option<PhaseActionFn<P>>,
    pub on_update: PhaseUpdateFn<P>,
}

// ---------------------------------------------------------------------------
// Scheduler engine
// ---------------------------------------------------------------------------

/// Runs the phase table, one full pass per tick.
pub struct Scheduler<P> {
    /// Fixed-size table indexed by `TickPhase as usize`.
    table: [PhaseDescriptor<P>; TickPhase::COUNT],
    /// Index of the current phase.
    current: usize,
    /// Completed ticks (wraps).
    tick_count: u32,
}

impl<P: Platform> Scheduler<P> {
    pub fn new(table: [PhaseDescriptor<P>; TickPhase::COUNT]) -> Self {
        Self {
            table,
            current: TickPhase::Sleep as usize,
            tick_count: 0,
        }
    }

    /// Scheduler with the standard phase table.
    pub fn with_default_phases() -> Self {
        Self::new(phases::build_phase_table())
    }

    /// Run the initial `on_enter` of the starting phase.
    pub fn start(&mut self, ctx: &mut TickContext<'_, P>) {
        info!("scheduler starting in phase: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Run one tick: step through the table until it returns to SLEEP.
    pub fn run_tick(&mut self, ctx: &mut TickContext<'_, P>) {
        loop {
            let next = (self.table[self.current].on_update)(ctx);
            self.transition(next, ctx);
            if next == TickPhase::Sleep {
                break;
            }
        }
        self.tick_count = self.tick_count.wrapping_add(1);
        debug!("tick {} done at second {}", self.tick_count, ctx.node.time_lsd);
    }

    pub fn current_phase(&self) -> TickPhase {
        TickPhase::from_index(self.current)
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: TickPhase, ctx: &mut TickContext<'_, P>) {
        let next_idx = next as usize;
        trace!(
            "phase: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }
        self.current = next_idx;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for i in 0..TickPhase::COUNT {
            assert_eq!(TickPhase::from_index(i) as usize, i);
        }
    }
}
