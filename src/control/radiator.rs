//! Modelled radiator valve.
//!
//! Wraps the valve controller with the per-minute plumbing: turning the
//! policy target and room conditions into [`ValveInputs`], deciding whether
//! the room is calling for heat, and the persisted "really open" floor.

use core::cell::Cell;

use log::{debug, info};

use crate::app::ports::NonVolatileStore;
use crate::error::{RangeError, Result};

use super::valve::{DEFAULT_VALVE_PC_MIN_REALLY_OPEN, ValveInputs, ValveState};

/// NV address of the minimum-really-open override.
pub const NV_MIN_VALVE_PC_REALLY_OPEN: u16 = 0x24;

/// Room conditions for one recompute.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadiatorEnv {
    /// Output of the target policy (C).
    pub target_temp_c: u8,
    pub in_warm_mode: bool,
    pub in_bake_mode: bool,
    pub has_eco_bias: bool,
    pub room_dark: bool,
    pub long_vacant: bool,
    /// Current room temperature (C/16).
    pub temp_c16: i16,
}

#[derive(Debug)]
pub struct RadiatorValve {
    inputs: ValveInputs,
    state: ValveState,
    valve_pc: u8,
    calling_for_heat: bool,
    glacial: bool,
    max_pc_open: u8,
    // 0 until first read from NV.
    min_pc_cache: Cell<u8>,
}

impl RadiatorValve {
    pub fn new(max_pc_open: u8) -> Self {
        Self {
            inputs: ValveInputs::default(),
            state: ValveState::new(),
            valve_pc: 0,
            calling_for_heat: false,
            glacial: false,
            max_pc_open: max_pc_open.clamp(1, 100),
            min_pc_cache: Cell::new(0),
        }
    }

    /// Restrict the valve to 1% per tick.
    pub fn set_glacial(&mut self, glacial: bool) {
        self.glacial = glacial;
    }

    /// Minimum percent open for a useful flow; NV override or default.
    pub fn min_valve_pc_really_open(&self, store: &impl NonVolatileStore) -> u8 {
        let cached = self.min_pc_cache.get();
        if cached != 0 {
            return cached;
        }
        let stored = store.read_byte(NV_MIN_VALVE_PC_REALLY_OPEN);
        let pc = if (1..=100).contains(&stored) {
            stored
        } else {
            DEFAULT_VALVE_PC_MIN_REALLY_OPEN
        };
        self.min_pc_cache.set(pc);
        pc
    }

    /// Persist a new floor, 1..=100. Setting the default erases the
    /// override. Anything else is rejected and NV is left untouched.
    pub fn set_min_valve_pc_really_open(&self, store: &mut impl NonVolatileStore, pc: u8) -> Result<()> {
        if !(1..=100).contains(&pc) {
            return Err(RangeError::MinValveOpen.into());
        }
        if pc == DEFAULT_VALVE_PC_MIN_REALLY_OPEN {
            store.smart_erase_byte(NV_MIN_VALVE_PC_REALLY_OPEN);
        } else {
            store.smart_update_byte(NV_MIN_VALVE_PC_REALLY_OPEN, pc);
        }
        self.min_pc_cache.set(pc);
        info!("valve: min really open {}%", pc);
        Ok(())
    }

    /// Load this minute's inputs and recompute the call for heat.
    pub fn compute_target_temperature(&mut self, store: &impl NonVolatileStore, env: &RadiatorEnv) {
        self.inputs.target_temp_c = env.target_temp_c;
        self.inputs.min_pc_open = self.min_valve_pc_really_open(store).min(self.max_pc_open);
        self.inputs.max_pc_open = self.max_pc_open;
        self.inputs.glacial = self.glacial;
        self.inputs.in_bake_mode = env.in_bake_mode;
        self.inputs.has_eco_bias = env.has_eco_bias;
        // Settle for looser regulation when nobody is likely to notice.
        self.inputs.widen_deadband =
            env.room_dark || env.long_vacant || !env.in_warm_mode || self.state.is_filtering();
        self.inputs.set_reference_temperatures(env.temp_c16);
        self.calling_for_heat = i16::from(env.target_temp_c) >= self.inputs.ref_temp_c16 >> 4;
    }

    /// Run one controller step against the inputs from the last
    /// [`compute_target_temperature`](Self::compute_target_temperature).
    /// Returns `true` if the valve moved.
    pub fn tick(&mut self) -> bool {
        let old = self.valve_pc;
        self.valve_pc = self.state.tick(old, &self.inputs);
        if self.state.valve_moved() {
            info!("valve: {}% -> {}% (target {}C)", old, self.valve_pc, self.inputs.target_temp_c);
        } else {
            debug!("valve: hold {}%", self.valve_pc);
        }
        self.state.valve_moved()
    }

    pub fn valve_pc(&self) -> u8 {
        self.valve_pc
    }

    pub fn target_temp_c(&self) -> u8 {
        self.inputs.target_temp_c
    }

    pub fn is_calling_for_heat(&self) -> bool {
        self.calling_for_heat
    }

    pub fn valve_moved(&self) -> bool {
        self.state.valve_moved()
    }

    pub fn cumulative_movement_pc(&self) -> u16 {
        self.state.cumulative_movement_pc()
    }

    pub fn is_filtering(&self) -> bool {
        self.state.is_filtering()
    }

    /// The valve is open enough to pass a useful flow of water. A remote
    /// valve only counts once its link is synced.
    pub fn is_controlled_valve_really_open(&self, store: &impl NonVolatileStore, link_ready: bool) -> bool {
        link_ready && self.valve_pc >= self.min_valve_pc_really_open(store)
    }
}
