//! Valve position controller.
//!
//! Once a minute [`ValveState::tick`] updates the temperature filter and
//! anti-hunting timers, then [`compute_required_percent_open`] picks the new
//! valve position. The computation is pure: everything it reads is in its
//! arguments, so it can be driven directly from tests.
//!
//! Strategy is "slow start, fast stop": open gently from cold, close
//! eagerly when over target, and regulate proportionally within the degree
//! just below target while avoiding needless movement.

/// Raw temperature samples kept for smoothing.
pub const FILTER_LENGTH: usize = 16;
/// Offset added to the room temperature to centre it within a degree (C/16).
pub const REF_TEMP_OFFSET_C16: i16 = 8;
/// Largest step between adjacent samples before filtering is forced (C/16).
pub const MAX_TEMP_JUMP_C16: i16 = 3;

/// Ticks after opening during which the valve will not close.
pub const ANTISEEK_RECLOSE_DELAY_M: u8 = 5;
/// Ticks after closing during which the valve will not open.
pub const ANTISEEK_REOPEN_DELAY_M: u8 = 10;

/// Default minimum percent open for a useful flow of water.
pub const DEFAULT_VALVE_PC_MIN_REALLY_OPEN: u8 = 10;
/// Percent open that typically delivers most of the radiator's output.
pub const DEFAULT_VALVE_PC_MODERATELY_OPEN: u8 = 35;
/// Minutes the valve may linger below the really-open floor.
pub const DEFAULT_MAX_RUN_ON_TIME_M: u8 = 5;

/// Smallest proportional move worth making (%).
pub const MIN_SLEW_PC: u8 = 7;
/// Normal opening slew (%/tick).
pub const MAX_SLEW_PC_PER_MIN: u8 = 5;
/// Fast slew (%/tick).
pub const SLEW_PC_PER_MIN_FAST: u8 = 10;

/// Percent per 1/16 C across the proportional band.
const ULP_STEP: u8 = 6;

/// Inputs prepared by the radiator model before each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveInputs {
    pub target_temp_c: u8,
    pub min_pc_open: u8,
    pub max_pc_open: u8,
    /// Move at most 1% per tick.
    pub glacial: bool,
    pub in_bake_mode: bool,
    pub has_eco_bias: bool,
    /// Tolerate a wider error band to save noise and battery.
    pub widen_deadband: bool,
    /// Room temperature plus [`REF_TEMP_OFFSET_C16`].
    pub ref_temp_c16: i16,
}

impl Default for ValveInputs {
    fn default() -> Self {
        Self {
            target_temp_c: 0,
            min_pc_open: DEFAULT_VALVE_PC_MIN_REALLY_OPEN,
            max_pc_open: 100,
            glacial: false,
            in_bake_mode: false,
            has_eco_bias: false,
            widen_deadband: false,
            ref_temp_c16: 0,
        }
    }
}

impl ValveInputs {
    pub fn set_reference_temperatures(&mut self, current_temp_c16: i16) {
        self.ref_temp_c16 = current_temp_c16.saturating_add(REF_TEMP_OFFSET_C16);
    }
}

/// State carried between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValveState {
    prev_raw_temp_c16: [i16; FILTER_LENGTH],
    initialised: bool,
    is_filtering: bool,
    turndown_countdown_m: u8,
    turnup_countdown_m: u8,
    cumulative_movement_pc: u16,
    valve_moved: bool,
}

impl Default for ValveState {
    fn default() -> Self {
        Self::new()
    }
}

impl ValveState {
    pub const fn new() -> Self {
        Self {
            prev_raw_temp_c16: [0; FILTER_LENGTH],
            initialised: false,
            is_filtering: false,
            turndown_countdown_m: 0,
            turnup_countdown_m: 0,
            cumulative_movement_pc: 0,
            valve_moved: false,
        }
    }

    /// Run one control step. Returns the new valve position.
    pub fn tick(&mut self, valve_pc: u8, inputs: &ValveInputs) -> u8 {
        let raw = inputs.ref_temp_c16.saturating_sub(REF_TEMP_OFFSET_C16);
        if !self.initialised {
            self.prev_raw_temp_c16 = [raw; FILTER_LENGTH];
            self.initialised = true;
        }
        self.prev_raw_temp_c16.copy_within(0..FILTER_LENGTH - 1, 1);
        self.prev_raw_temp_c16[0] = raw;

        // Leave filtering only once the raw value has caught up with the
        // smoothed one, so switching over causes no jump of its own.
        if self.is_filtering && (self.smoothed_recent() - raw).abs() <= MAX_TEMP_JUMP_C16 {
            self.is_filtering = false;
        }
        if !self.is_filtering {
            self.is_filtering = self
                .prev_raw_temp_c16
                .windows(2)
                .any(|w| (w[0] - w[1]).abs() > MAX_TEMP_JUMP_C16);
        }

        self.turndown_countdown_m = self.turndown_countdown_m.saturating_sub(1);
        self.turnup_countdown_m = self.turnup_countdown_m.saturating_sub(1);

        let new_pc = compute_required_percent_open(valve_pc, inputs, self);
        self.valve_moved = new_pc != valve_pc;
        if new_pc > valve_pc {
            self.turndown_countdown_m = ANTISEEK_RECLOSE_DELAY_M;
            self.cumulative_movement_pc =
                self.cumulative_movement_pc.wrapping_add(u16::from(new_pc - valve_pc));
        } else if new_pc < valve_pc {
            self.turnup_countdown_m = ANTISEEK_REOPEN_DELAY_M;
            self.cumulative_movement_pc =
                self.cumulative_movement_pc.wrapping_add(u16::from(valve_pc - new_pc));
        }
        new_pc
    }

    /// Rounded mean of the buffered raw samples (C/16).
    pub fn smoothed_recent(&self) -> i16 {
        let sum: i32 = self.prev_raw_temp_c16.iter().map(|&t| i32::from(t)).sum();
        let n = FILTER_LENGTH as i32;
        ((sum + n / 2) / n) as i16
    }

    /// Latest raw sample minus the one before; positive when warming.
    pub fn raw_delta(&self) -> i16 {
        self.prev_raw_temp_c16[0] - self.prev_raw_temp_c16[1]
    }

    pub fn is_filtering(&self) -> bool {
        self.is_filtering
    }

    /// Recently opened; hold off closing.
    pub fn dont_turndown(&self) -> bool {
        self.turndown_countdown_m > 0
    }

    /// Recently closed; hold off opening.
    pub fn dont_turnup(&self) -> bool {
        self.turnup_countdown_m > 0
    }

    /// Total percent travelled, both directions, wrapping at 65536.
    pub fn cumulative_movement_pc(&self) -> u16 {
        self.cumulative_movement_pc
    }

    /// The last tick changed the valve position.
    pub fn valve_moved(&self) -> bool {
        self.valve_moved
    }
}

fn constrain(v: i16, lo: i16, hi: i16) -> i16 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Valve position, 0..=100, for the next minute.
///
/// Glacial mode overrides BAKE, so a glacial valve never moves more than
/// 1% per call. The anti-hunting, deadband and near-target holds still
/// apply to it.
pub fn compute_required_percent_open(valve_pc: u8, inputs: &ValveInputs, state: &ValveState) -> u8 {
    let v = valve_pc;
    let min_pc = inputs.min_pc_open;
    let max_pc = inputs.max_pc_open;
    let target = i16::from(inputs.target_temp_c);

    let adjusted_c16 = if state.is_filtering() {
        state.smoothed_recent().saturating_add(REF_TEMP_OFFSET_C16)
    } else {
        inputs.ref_temp_c16
    };
    let adjusted_c = adjusted_c16 >> 4;

    // Below target: open.
    if adjusted_c < target {
        if v >= max_pc {
            return max_pc;
        }
        if inputs.in_bake_mode && !inputs.glacial {
            return max_pc;
        }
        if state.dont_turnup() {
            return v;
        }
        let be_glacial = inputs.glacial
            || (v >= min_pc
                && ((inputs.widen_deadband
                    && inputs.has_eco_bias
                    && adjusted_c >= (target - 3).max(5))
                    || (state.is_filtering() && state.raw_delta() > 0)));
        if be_glacial {
            return v + 1;
        }
        let slew = if v >= DEFAULT_VALVE_PC_MODERATELY_OPEN || adjusted_c == target - 1 {
            MAX_SLEW_PC_PER_MIN
        } else {
            SLEW_PC_PER_MIN_FAST
        };
        // Jump straight to a useful flow from cold.
        let min_open_from_cold = slew.max(min_pc).min(max_pc);
        if v < min_open_from_cold {
            return min_open_from_cold;
        }
        return v.saturating_add(slew).min(max_pc);
    }

    // Above target: close.
    if adjusted_c > target {
        if v == 0 {
            return 0;
        }
        if state.dont_turndown() {
            return v;
        }
        if inputs.glacial {
            return v - 1;
        }
        let just_over = adjusted_c == target + 1;
        if just_over && inputs.widen_deadband && state.raw_delta() < 0 {
            return v;
        }
        if just_over && state.is_filtering() {
            return v - 1;
        }

        // Linger just below the really-open floor so the system bypass
        // copes, then shut in one go once run-on time is used up.
        let linger = min_pc.saturating_sub(1);
        if v < min_pc {
            if DEFAULT_MAX_RUN_ON_TIME_M < min_pc && v < min_pc - DEFAULT_MAX_RUN_ON_TIME_M {
                return 0;
            }
            return v - 1;
        }
        let fast = i16::from(SLEW_PC_PER_MIN_FAST);
        if (!inputs.has_eco_bias || just_over || state.is_filtering())
            && i16::from(v) > constrain(i16::from(linger) + fast, fast, i16::from(max_pc))
        {
            return v - SLEW_PC_PER_MIN_FAST;
        }
        return linger.min(v);
    }

    // Within the degree below target: proportional.
    let lsbits = (adjusted_c16 & 0xf) as u8;
    let target_po = constrain(
        i16::from((16 - lsbits) * ULP_STEP),
        i16::from(min_pc),
        i16::from(max_pc),
    ) as u8;
    if target_po == v {
        return v;
    }

    // Deadband: never react to a single 1/16 C wobble.
    let deadband = if inputs.widen_deadband {
        (DEFAULT_VALVE_PC_MODERATELY_OPEN / 2)
            .min(MAX_SLEW_PC_PER_MIN.max(2 * MIN_SLEW_PC))
            .max(2 + MIN_SLEW_PC)
    } else {
        MIN_SLEW_PC
    };
    let min_abs_slew = deadband.max(1 + ULP_STEP);

    if target_po < v {
        let slew = v - target_po;
        if slew < min_abs_slew || state.dont_turndown() {
            return v;
        }
        // Nothing in the band forces the temperature down; only close
        // while it is still rising.
        if state.raw_delta() <= 0 {
            return v;
        }
        if inputs.glacial
            || ((inputs.widen_deadband || state.is_filtering())
                && v <= DEFAULT_VALVE_PC_MODERATELY_OPEN)
            || lsbits < 8
        {
            return v - 1;
        }
        if slew > SLEW_PC_PER_MIN_FAST {
            return v - SLEW_PC_PER_MIN_FAST;
        }
        return target_po;
    }

    if inputs.in_bake_mode && !inputs.glacial {
        return max_pc;
    }
    let slew = target_po - v;
    if slew < min_abs_slew || state.dont_turnup() {
        return v;
    }
    // Already warming, or nearly there: leave it be.
    if state.raw_delta() > 0 {
        return v;
    }
    if lsbits >= if inputs.widen_deadband { 8 } else { 12 } {
        return v;
    }
    if inputs.glacial
        || inputs.widen_deadband
        || lsbits >= 8
        || (lsbits >= 4 && v >= DEFAULT_VALVE_PC_MODERATELY_OPEN)
    {
        return v + 1;
    }
    let max_slew = if inputs.has_eco_bias {
        MAX_SLEW_PC_PER_MIN
    } else {
        SLEW_PC_PER_MIN_FAST
    };
    if slew > max_slew {
        return v + max_slew;
    }
    target_po
}
