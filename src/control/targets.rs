//! FROST and WARM target temperatures.
//!
//! Targets persist in NV unless a temperature dial is fitted, in which case
//! WARM follows the dial and FROST follows the resulting eco/comfort bias.

use log::{info, warn};

use crate::app::ports::NonVolatileStore;
use crate::config::NodeConfig;
use crate::error::{RangeError, Result};

/// Lowest settable target (C).
pub const MIN_TARGET_C: u8 = 5;
/// Highest settable target (C).
pub const MAX_TARGET_C: u8 = 95;

/// FROST target with an eco bias (C).
pub const BIASECO_FROST: u8 = 6;
/// FROST target with a comfort bias (C).
pub const BIASCOM_FROST: u8 = 8;
/// At or below this WARM target the user is being frugal (C).
pub const BIASECO_WARM: u8 = 17;
/// At or above this WARM target the user wants comfort (C).
pub const BIASCOM_WARM: u8 = 21;

/// Dial scale, bottom / middle / top (C).
pub const TEMP_SCALE_MIN: u8 = 16;
pub const TEMP_SCALE_MID: u8 = 19;
pub const TEMP_SCALE_MAX: u8 = 22;

/// NV address of the FROST target.
pub const NV_FROST_C: u16 = 0x21;
/// NV address of the WARM target.
pub const NV_WARM_C: u16 = 0x22;

pub fn is_eco_temperature(t: u8) -> bool {
    t <= BIASECO_WARM
}

pub fn is_comfort_temperature(t: u8) -> bool {
    t >= BIASCOM_WARM
}

/// Map an 8-bit dial reading onto the WARM scale. The end bands pin to the
/// scale limits so the extremes are easy to hit.
pub fn warm_target_from_pot(pot: u8) -> u8 {
    const RANGE: u16 = (TEMP_SCALE_MAX - TEMP_SCALE_MIN + 1) as u16;
    const BAND: u16 = 256 / RANGE;
    let pot = u16::from(pot);
    if pot >= 256 - BAND {
        return TEMP_SCALE_MAX;
    }
    if pot < BAND {
        return TEMP_SCALE_MIN;
    }
    let mut result = TEMP_SCALE_MIN + 1;
    let mut step = BAND << 1;
    while step < pot {
        step += BAND;
        result += 1;
    }
    result.min(TEMP_SCALE_MAX)
}

fn in_target_range(t: u8) -> bool {
    (MIN_TARGET_C..=MAX_TARGET_C).contains(&t)
}

/// Target temperature settings, resolved from config at start-up.
#[derive(Debug, Clone)]
pub struct TempControl {
    temp_pot: bool,
    frost_default_c: u8,
    warm_default_c: u8,
}

impl TempControl {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            temp_pot: config.temp_pot,
            frost_default_c: config.frost_default_c,
            warm_default_c: config.warm_default_c,
        }
    }

    /// Current WARM target. `pot` is the cached dial reading.
    pub fn warm_target_c(&self, store: &impl NonVolatileStore, pot: u8) -> u8 {
        if self.temp_pot {
            return warm_target_from_pot(pot);
        }
        let stored = store.read_byte(NV_WARM_C);
        let warm = if in_target_range(stored) { stored } else { self.warm_default_c };
        warm.max(self.settable_frost_c(store))
    }

    /// Current FROST target. High humidity lifts it to the comfort level
    /// when a dial is fitted.
    pub fn frost_target_c(&self, store: &impl NonVolatileStore, pot: u8, humidity_high: bool) -> u8 {
        if !self.temp_pot {
            return self.settable_frost_c(store);
        }
        let base = if !self.has_eco_bias(store, pot) || humidity_high {
            BIASCOM_FROST
        } else {
            BIASECO_FROST
        };
        let stored = store.read_byte(NV_FROST_C);
        if in_target_range(stored) && stored > base { stored } else { base }
    }

    fn settable_frost_c(&self, store: &impl NonVolatileStore) -> u8 {
        let stored = store.read_byte(NV_FROST_C);
        if in_target_range(stored) { stored } else { self.frost_default_c }
    }

    /// WARM target is at the frugal end of the scale.
    pub fn has_eco_bias(&self, store: &impl NonVolatileStore, pot: u8) -> bool {
        self.warm_target_c(store, pot) <= TEMP_SCALE_MID
    }

    /// Persist a new FROST target. Must be in range and not above WARM.
    pub fn set_frost_target_c(&self, store: &mut impl NonVolatileStore, t: u8, pot: u8) -> Result<()> {
        if !in_target_range(t) || t > self.warm_target_c(store, pot) {
            warn!("targets: rejected FROST {}C", t);
            return Err(RangeError::FrostTarget.into());
        }
        store.smart_update_byte(NV_FROST_C, t);
        info!("targets: FROST {}C", t);
        Ok(())
    }

    /// Persist a new WARM target. Must be in range and not below FROST.
    pub fn set_warm_target_c(&self, store: &mut impl NonVolatileStore, t: u8) -> Result<()> {
        if self.temp_pot {
            return Err(RangeError::NotSettable.into());
        }
        if !in_target_range(t) || t < self.settable_frost_c(store) {
            warn!("targets: rejected WARM {}C", t);
            return Err(RangeError::WarmTarget.into());
        }
        store.smart_update_byte(NV_WARM_C, t);
        info!("targets: WARM {}C", t);
        Ok(())
    }
}
