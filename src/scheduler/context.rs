//! Tick-scoped context threaded through every phase handler.
//!
//! `TickContext` borrows the platform and the node state for the length
//! of one tick and carries the flags derived at the top of that tick.
//! Nothing in [`TickFlags`] outlives the tick.

use crate::node::NodeState;

/// Sub-cycle time at or past which non-critical work is skipped.
pub const NEAR_OVERRUN_THRESHOLD: u8 = u8::MAX - 8;

/// Booleans derived once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickFlags {
    /// The tick before the sleep was second 0 of the minute.
    pub second0: bool,
    /// `minute_count & 3`.
    pub minute_from_4: u8,
    pub battery_low: bool,
    pub conserve_battery: bool,
    /// Listening for remote calls for heat this tick.
    pub hub_mode: bool,
    /// Some output was skipped because the deadline was close.
    pub too_near_overrun: bool,
    /// Repeat valve-link frames for robustness.
    pub double_tx: bool,
    /// The valve link wants the remaining TX windows of this tick.
    pub use_extra_tx_slots: bool,
    /// Optional minute tasks run this tick.
    pub run_all: bool,
    /// Emit a status report before the CLI window.
    pub show_status: bool,
}

impl TickFlags {
    /// Quietest minute of four, kept for sensor reads.
    pub fn minute0_from_4(&self) -> bool {
        self.minute_from_4 == 0
    }

    /// The minute after the sensor minute.
    pub fn minute1_from_4(&self) -> bool {
        self.minute_from_4 == 1
    }
}

pub struct TickContext<'a, P> {
    pub platform: &'a mut P,
    pub node: &'a mut NodeState,
    pub flags: TickFlags,
}

impl<'a, P> TickContext<'a, P> {
    pub fn new(platform: &'a mut P, node: &'a mut NodeState) -> Self {
        Self {
            platform,
            node,
            flags: TickFlags::default(),
        }
    }
}
