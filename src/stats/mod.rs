//! Hourly statistics kept in non-volatile memory.
//!
//! Nine sets of 24 one-byte slots, one per hour of the day, laid out back to
//! back from [`STATS_START`]. Numeric quantities come in pairs: the "last"
//! set holds the most recent full sample and the set immediately after it
//! holds the exponentially smoothed value. `0xFF` marks an unset slot.

pub mod codec;
pub mod sampler;
pub mod store;

/// Slots per set, one per hour of the day.
pub const STATS_SET_SIZE: u16 = 24;

/// First NV address of the stats area.
pub const STATS_START: u16 = 0x100;

/// Number of stats sets.
pub const STATS_SETS: u8 = 9;

/// Last NV address of the stats area (inclusive).
pub const STATS_END: u16 = STATS_START + STATS_SETS as u16 * STATS_SET_SIZE - 1;

/// Value of an unset slot.
pub const STATS_UNSET: u8 = 0xFF;

/// The stats sets in NV order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatsSet {
    /// Compressed temperature, last sample.
    TempByHour = 0,
    TempByHourSmoothed = 1,
    /// Ambient light, 0..=254.
    AmbLightByHour = 2,
    AmbLightByHourSmoothed = 3,
    /// Occupancy confidence percent.
    OccPcByHour = 4,
    OccPcByHourSmoothed = 5,
    /// Relative humidity percent.
    RhPcByHour = 6,
    RhPcByHourSmoothed = 7,
    /// Seven-day rolling WARM/FROST bit history per hour.
    WarmModeByHourOfWeek = 8,
}

impl StatsSet {
    /// NV address of the slot for hour `hh`.
    pub const fn addr(self, hh: u8) -> u16 {
        STATS_START + (self as u16) * STATS_SET_SIZE + hh as u16
    }

    /// Smoothed partner of a "last" set.
    pub const fn smoothed(self) -> Option<Self> {
        match self {
            Self::TempByHour => Some(Self::TempByHourSmoothed),
            Self::AmbLightByHour => Some(Self::AmbLightByHourSmoothed),
            Self::OccPcByHour => Some(Self::OccPcByHourSmoothed),
            Self::RhPcByHour => Some(Self::RhPcByHourSmoothed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_contiguous() {
        assert_eq!(StatsSet::TempByHour.addr(0), STATS_START);
        assert_eq!(StatsSet::TempByHourSmoothed.addr(0), STATS_START + 24);
        assert_eq!(StatsSet::WarmModeByHourOfWeek.addr(23), STATS_END);
    }

    #[test]
    fn smoothed_set_follows_last_set() {
        for set in [
            StatsSet::TempByHour,
            StatsSet::AmbLightByHour,
            StatsSet::OccPcByHour,
            StatsSet::RhPcByHour,
        ] {
            let s = set.smoothed().unwrap();
            assert_eq!(s.addr(5), set.addr(5) + STATS_SET_SIZE);
        }
        assert_eq!(StatsSet::WarmModeByHourOfWeek.smoothed(), None);
    }
}
