//! Sensor-derived state the node keeps between raw reads.
//!
//! Raw sampling lives behind [`SensorPort`](crate::app::ports::SensorPort);
//! this module holds what the control logic derives from those samples.

pub mod ambient;

pub use ambient::AmbientLight;

/// Ambient light in the one-byte form used in stats records, 1..=254.
pub fn amb_light_for_stats(raw: u8) -> u8 {
    (raw >> 2).clamp(1, 254)
}

/// Supply voltage in centivolts, as reported in JSON stats.
pub fn supply_cv(supply_mv: u16) -> i16 {
    (supply_mv / 10).min(i16::MAX as u16) as i16
}
