//! Inbound commands to the control core.
//!
//! These are the only entry points the UI and CLI layers use. Input is
//! already debounced by the time it arrives here; out-of-range settings
//! are rejected and leave persisted state untouched.

use log::{info, warn};

use crate::error::Result;
use crate::node::NodeState;
use crate::scheduler::hub::set_min_boiler_on_minutes;
use crate::user_schedule::{clear_simple_schedule, set_simple_schedule};

use super::ports::{NonVolatileStore, SensorPort};

/// Commands that UI and CLI adapters send into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Switch between WARM (`true`) and FROST (`false`).
    SetWarmMode(bool),
    /// Start or restart a BAKE.
    StartBake,
    CancelBake,
    /// New FROST target (C).
    SetFrostTarget(u8),
    /// New WARM target (C).
    SetWarmTarget(u8),
    /// Minimum percent open for the valve to count as really open.
    SetMinValvePcReallyOpen(u8),
    /// Minimum boiler run per remote call (minutes); 0 disables the hub.
    SetMinBoilerOnMinutes(u8),
    /// Set schedule slot `which` to start at `minutes` past midnight.
    SetSchedule { which: u8, minutes: u16 },
    ClearSchedule(u8),
    /// Erase all hourly stats, a few bytes per tick.
    ZapStats,
}

impl NodeCommand {
    /// Direct use of the node's controls, as opposed to configuration.
    pub fn is_manual_control(&self) -> bool {
        matches!(self, Self::SetWarmMode(_) | Self::StartBake | Self::CancelBake)
    }
}

/// Apply `cmd` to the node. Manual control also marks the room occupied.
pub fn apply_command<P>(node: &mut NodeState, p: &mut P, cmd: NodeCommand) -> Result<()>
where
    P: NonVolatileStore + SensorPort,
{
    if cmd.is_manual_control() && node.config.occupancy_support {
        node.occupancy().mark_as_occupied();
    }
    let result = match cmd {
        NodeCommand::SetWarmMode(warm) => {
            node.mode.set_warm_mode(warm);
            Ok(())
        }
        NodeCommand::StartBake => {
            if !node.mode.start_bake() {
                info!("command: BAKE not supported");
            }
            Ok(())
        }
        NodeCommand::CancelBake => {
            node.mode.cancel_bake();
            Ok(())
        }
        NodeCommand::SetFrostTarget(t) => {
            let pot = p.temp_pot();
            node.temps.set_frost_target_c(p, t, pot)
        }
        NodeCommand::SetWarmTarget(t) => node.temps.set_warm_target_c(p, t),
        NodeCommand::SetMinValvePcReallyOpen(pc) => node.radiator.set_min_valve_pc_really_open(p, pc),
        NodeCommand::SetMinBoilerOnMinutes(m) => {
            set_min_boiler_on_minutes(p, m);
            Ok(())
        }
        NodeCommand::SetSchedule { which, minutes } => set_simple_schedule(p, minutes, which),
        NodeCommand::ClearSchedule(which) => clear_simple_schedule(p, which),
        NodeCommand::ZapStats => {
            node.start_zap();
            Ok(())
        }
    };
    if let Err(e) = &result {
        warn!("command {:?} rejected: {}", cmd, e);
    }
    result
}
