//! Node capability set.
//!
//! Resolved once at start-up and consulted by every component in place of
//! build-time feature switches. Values can be loaded from the NV config
//! blob or supplied as JSON to the host simulator.

use serde::{Deserialize, Serialize};

use crate::control::targets::{MAX_TARGET_C, MIN_TARGET_C};
use crate::error::{Error, Result};

/// Core node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Capabilities ---
    /// BAKE mode can be started from the UI.
    pub bake_supported: bool,
    /// A relative-humidity sensor is fitted.
    pub humidity_sensor: bool,
    /// Occupancy sensing and setbacks are enabled.
    pub occupancy_support: bool,
    /// Use historical stats to anticipate when warmth is wanted.
    pub anticipation: bool,
    /// WARM target comes from a temperature dial rather than NV.
    pub temp_pot: bool,
    /// This node regulates a radiator valve of its own rather than only
    /// reporting sensor readings.
    pub local_trv: bool,
    /// Restrict valve movement to 1% per minute.
    pub glacial: bool,
    /// A voice/noise sensor is fitted.
    pub voice_sensor: bool,
    /// RTC ticks every two seconds instead of every second.
    pub two_second_tick: bool,

    // --- Radio ---
    /// Stats are transmitted at all.
    pub stats_tx: bool,
    /// Use the JSON rotation for stats in addition to the binary record.
    pub json_stats: bool,
    /// Listen for remote calls for heat and drive the boiler output.
    pub hub_listen: bool,
    /// Occupancy is included in outbound stats.
    pub disclose_occupancy: bool,

    // --- Targets ---
    /// FROST target used when NV holds no valid value (C).
    pub frost_default_c: u8,
    /// WARM target used when NV holds no valid value (C).
    pub warm_default_c: u8,
    /// Upper bound on valve percent open.
    pub max_pc_open: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Capabilities
            bake_supported: true,
            humidity_sensor: false,
            occupancy_support: true,
            anticipation: true,
            temp_pot: false,
            local_trv: false,
            glacial: false,
            voice_sensor: false,
            two_second_tick: false,

            // Radio
            stats_tx: true,
            json_stats: true,
            hub_listen: false,
            disclose_occupancy: true,

            // Targets
            frost_default_c: 6,
            warm_default_c: 18,
            max_pc_open: 100,
        }
    }
}

impl NodeConfig {
    /// Parse a JSON document, filling omitted fields from defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON config"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TARGET_C..=MAX_TARGET_C).contains(&self.frost_default_c) {
            return Err(Error::Config("frost_default_c out of range"));
        }
        if !(MIN_TARGET_C..=MAX_TARGET_C).contains(&self.warm_default_c) {
            return Err(Error::Config("warm_default_c out of range"));
        }
        if self.frost_default_c > self.warm_default_c {
            return Err(Error::Config("frost_default_c must not exceed warm_default_c"));
        }
        if !(1..=100).contains(&self.max_pc_open) {
            return Err(Error::Config("max_pc_open must be 1-100"));
        }
        Ok(())
    }

    /// Seconds per RTC tick.
    pub const fn tick_seconds(&self) -> u8 {
        if self.two_second_tick { 2 } else { 1 }
    }
}
