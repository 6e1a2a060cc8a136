//! Target temperature policy.
//!
//! Given the mode, occupancy, light, schedule and historical signals this
//! picks the temperature to aim for right now. Pure: every input is in
//! [`PolicyInputs`], assembled by the node once per recompute.

use crate::app::ports::NonVolatileStore;
use crate::stats::codec::expand_temp_c16;
use crate::stats::store::in_outlier_quartile;
use crate::stats::{STATS_UNSET, StatsSet};

use super::targets::{MAX_TARGET_C, TEMP_SCALE_MID, is_eco_temperature};

/// Small setback that occupants should not notice (C).
pub const SETBACK_DEFAULT: u8 = 1;
/// Setback when the room is probably empty (C).
pub const SETBACK_ECO: u8 = 2;
/// Setback when the room has been empty a long time (C).
pub const SETBACK_FULL: u8 = 3;
/// BAKE lifts the WARM target by this much (C).
pub const BAKE_UPLIFT: u8 = 5;
/// Dark minutes after which a WARM setback is considered.
pub const DARK_SETBACK_MINUTES: u8 = 10;

/// Snapshot of everything the policy looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyInputs {
    pub warm_mode: bool,
    pub bake_mode: bool,
    pub warm_target_c: u8,
    pub frost_target_c: u8,
    /// Vacant for more than ~8 hours.
    pub long_vacant: bool,
    /// Vacant for more than ~a day.
    pub long_long_vacant: bool,
    pub likely_occupied: bool,
    pub room_lit: bool,
    pub dark_minutes: u8,
    pub schedule_on_now: bool,
    pub schedule_on_soon: bool,
    pub recent_ui_use: bool,
    /// Occupancy for the current hour is historically in the bottom quartile.
    pub occupancy_bottom_quartile: bool,
    /// Occupancy for the current hour is historically in the top quartile.
    pub occupancy_top_quartile: bool,
}

impl PolicyInputs {
    pub fn has_eco_bias(&self) -> bool {
        self.warm_target_c <= TEMP_SCALE_MID
    }
}

/// Target temperature for this minute, in C.
///
/// FROST returns the frost floor, or a pre-warm level ahead of a schedule.
/// BAKE lifts WARM by [`BAKE_UPLIFT`]. WARM may be set back by one of three
/// amounts but never below the frost floor.
pub fn compute_target_temp(i: &PolicyInputs) -> u8 {
    let frost = i.frost_target_c;
    let warm = i.warm_target_c;

    if !i.warm_mode {
        // Pre-warm for a schedule starting soon, unless the room has been
        // empty for ages or the user has just intervened.
        if !i.long_vacant && i.schedule_on_soon && !i.recent_ui_use {
            let setback = if i.has_eco_bias() { SETBACK_ECO } else { SETBACK_DEFAULT };
            let pre_warm = warm.saturating_sub(setback).max(frost);
            if frost < pre_warm && !is_eco_temperature(warm) {
                return pre_warm;
            }
        }
        return frost;
    }

    if i.bake_mode {
        return warm.saturating_add(BAKE_UPLIFT).min(MAX_TARGET_C);
    }

    let long_long_vacant = i.long_long_vacant;
    let long_vacant = long_long_vacant || i.long_vacant;
    let not_likely_occupied_soon =
        long_long_vacant || (!i.likely_occupied && i.occupancy_bottom_quartile);

    let wants_setback = long_vacant
        || ((not_likely_occupied_soon || i.dark_minutes > DARK_SETBACK_MINUTES)
            && !i.schedule_on_now
            && !i.recent_ui_use);
    if !wants_setback {
        return warm;
    }

    let mild = !i.has_eco_bias()
        || i.likely_occupied
        || (!long_long_vacant && i.room_lit)
        || (!long_long_vacant && i.occupancy_top_quartile)
        || (!long_vacant && i.schedule_on_soon);
    let setback = if mild {
        SETBACK_DEFAULT
    } else if long_long_vacant || (not_likely_occupied_soon && is_eco_temperature(warm)) {
        SETBACK_FULL
    } else {
        SETBACK_ECO
    };
    warm.saturating_sub(setback).max(frost)
}

/// Historical hint that the room will want warmth at hour `hh`.
///
/// Vetoed outright if that hour is historically among the darkest or
/// emptiest. Otherwise a WARM history for that hour, or a smoothed
/// temperature at or above the WARM target, is enough.
pub fn should_be_warmed_at_hour(
    store: &impl NonVolatileStore,
    hh: u8,
    warm_target_c: u8,
    occupancy_support: bool,
) -> bool {
    if in_outlier_quartile(store, false, StatsSet::AmbLightByHourSmoothed, hh) {
        return false;
    }
    if occupancy_support && in_outlier_quartile(store, false, StatsSet::OccPcByHourSmoothed, hh) {
        return false;
    }

    let history = store.read_byte(StatsSet::WarmModeByHourOfWeek.addr(hh % 24));
    // Warm yesterday or a week ago, and on at least one other day.
    if history & 0x80 == 0 && history & 0x41 != 0 && history & 0x3e != 0 {
        return true;
    }

    let smoothed = store.read_byte(StatsSet::TempByHourSmoothed.addr(hh % 24));
    if smoothed == STATS_UNSET {
        return false;
    }
    matches!(expand_temp_c16(smoothed), Some(t) if ((i32::from(t) + 8) >> 4) >= i32::from(warm_target_c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;
    use crate::stats::codec::compress_temp_c16;

    fn warm(warm_target_c: u8) -> PolicyInputs {
        PolicyInputs {
            warm_mode: true,
            warm_target_c,
            frost_target_c: 6,
            room_lit: true,
            ..PolicyInputs::default()
        }
    }

    #[test]
    fn frost_mode_without_schedule_is_frost_floor() {
        let i = PolicyInputs {
            warm_target_c: 18,
            frost_target_c: 6,
            ..PolicyInputs::default()
        };
        assert_eq!(compute_target_temp(&i), 6);
    }

    #[test]
    fn frost_mode_prewarms_ahead_of_schedule() {
        let i = PolicyInputs {
            warm_target_c: 20,
            frost_target_c: 6,
            schedule_on_soon: true,
            ..PolicyInputs::default()
        };
        // Comfort bias: default setback.
        assert_eq!(compute_target_temp(&i), 19);
        let eco = PolicyInputs { warm_target_c: 17, ..i };
        assert_eq!(compute_target_temp(&eco), 6, "no pre-warm at eco WARM targets");
        let fiddled = PolicyInputs { recent_ui_use: true, ..i };
        assert_eq!(compute_target_temp(&fiddled), 6);
    }

    #[test]
    fn bake_uplifts_and_caps() {
        let i = PolicyInputs {
            bake_mode: true,
            ..warm(18)
        };
        assert_eq!(compute_target_temp(&i), 23);
        let hot = PolicyInputs {
            bake_mode: true,
            ..warm(93)
        };
        assert_eq!(compute_target_temp(&hot), MAX_TARGET_C);
    }

    #[test]
    fn occupied_lit_room_gets_full_warm_target() {
        let i = PolicyInputs {
            likely_occupied: true,
            ..warm(18)
        };
        assert_eq!(compute_target_temp(&i), 18);
    }

    #[test]
    fn long_long_vacant_eco_gets_full_setback() {
        let i = PolicyInputs {
            long_vacant: true,
            long_long_vacant: true,
            room_lit: false,
            dark_minutes: 200,
            ..warm(18)
        };
        assert_eq!(compute_target_temp(&i), 18 - SETBACK_FULL);
    }

    #[test]
    fn long_vacant_dark_eco_gets_eco_setback() {
        let i = PolicyInputs {
            long_vacant: true,
            room_lit: false,
            dark_minutes: 60,
            ..warm(18)
        };
        assert_eq!(compute_target_temp(&i), 18 - SETBACK_ECO);
    }

    #[test]
    fn comfort_bias_only_gets_mild_setback() {
        let i = PolicyInputs {
            long_vacant: true,
            long_long_vacant: true,
            room_lit: false,
            ..warm(21)
        };
        assert_eq!(compute_target_temp(&i), 21 - SETBACK_DEFAULT);
    }

    #[test]
    fn setback_never_below_frost() {
        let i = PolicyInputs {
            long_long_vacant: true,
            frost_target_c: 17,
            ..warm(18)
        };
        assert_eq!(compute_target_temp(&i), 17);
    }

    #[test]
    fn schedule_now_or_manual_use_suppresses_dark_setback() {
        let dark = PolicyInputs {
            room_lit: false,
            dark_minutes: 30,
            ..warm(18)
        };
        assert!(compute_target_temp(&dark) < 18);
        assert_eq!(
            compute_target_temp(&PolicyInputs {
                schedule_on_now: true,
                ..dark
            }),
            18
        );
        assert_eq!(
            compute_target_temp(&PolicyInputs {
                recent_ui_use: true,
                ..dark
            }),
            18
        );
    }

    #[test]
    fn warmed_hour_from_history() {
        let mut store = NvsAdapter::new();
        let addr = StatsSet::WarmModeByHourOfWeek.addr(7);
        store.smart_update_byte(addr, 0x41);
        assert!(!should_be_warmed_at_hour(&store, 7, 18, true), "one day only");
        store.smart_update_byte(addr, 0x42);
        assert!(should_be_warmed_at_hour(&store, 7, 18, true));
    }

    #[test]
    fn warmed_hour_from_smoothed_temperature() {
        let mut store = NvsAdapter::new();
        assert!(!should_be_warmed_at_hour(&store, 3, 18, true));
        store.smart_update_byte(StatsSet::TempByHourSmoothed.addr(3), compress_temp_c16(18 << 4));
        assert!(should_be_warmed_at_hour(&store, 3, 18, true));
        assert!(!should_be_warmed_at_hour(&store, 3, 19, true));
    }

    #[test]
    fn dark_hour_vetoes_warming() {
        let mut store = NvsAdapter::new();
        for hh in 0..24u8 {
            let v = if hh == 2 { 0 } else { 100 + hh };
            store.smart_update_byte(StatsSet::AmbLightByHourSmoothed.addr(hh), v);
        }
        store.smart_update_byte(StatsSet::WarmModeByHourOfWeek.addr(2), 0x7f);
        assert!(!should_be_warmed_at_hour(&store, 2, 18, true));
        store.smart_update_byte(StatsSet::WarmModeByHourOfWeek.addr(12), 0x7f);
        assert!(should_be_warmed_at_hour(&store, 12, 18, true));
    }
}
