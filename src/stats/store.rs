//! Reading, updating and erasing the persisted stats sets.
//!
//! Every write goes through the store's smart update so unchanged bytes
//! cost no wear.

use log::debug;

use crate::app::ports::{NonVolatileStore, RandomSource};

use super::codec::smooth_stats_value;
use super::{STATS_END, STATS_SET_SIZE, STATS_START, STATS_UNSET, StatsSet};

/// Values strictly beyond the probe needed for a quartile hit.
const QUARTILE_COUNT: u8 = 18;

/// Raw slot for hour `hh`, or `None` when unset or out of range.
pub fn get_by_hour_stat(store: &impl NonVolatileStore, set: StatsSet, hh: u8) -> Option<u8> {
    if hh > 23 {
        return None;
    }
    match store.read_byte(set.addr(hh)) {
        STATS_UNSET => None,
        v => Some(v),
    }
}

/// Write the last-sample slot and fold the value into its smoothed partner.
/// An unset smoothed slot takes the value as-is.
pub fn update_stats_pair(
    store: &mut impl NonVolatileStore,
    last_set: StatsSet,
    hh: u8,
    value: u8,
    rng: &mut impl RandomSource,
) {
    let last_addr = last_set.addr(hh);
    store.smart_update_byte(last_addr, value);
    let smoothed_addr = last_addr + STATS_SET_SIZE;
    let smoothed = store.read_byte(smoothed_addr);
    let next = if smoothed == STATS_UNSET {
        value
    } else {
        smooth_stats_value(smoothed, value, rng)
    };
    store.smart_update_byte(smoothed_addr, next);
}

/// True iff all 24 slots are set and at least 18 of them are strictly
/// greater than `sample`. Always false when all samples are equal.
pub fn in_bottom_quartile(store: &impl NonVolatileStore, set: StatsSet, sample: u8) -> bool {
    let mut higher = 0u8;
    for hh in 0..24 {
        let v = store.read_byte(set.addr(hh));
        if v == STATS_UNSET {
            return false;
        }
        if v > sample {
            higher += 1;
            if higher >= QUARTILE_COUNT {
                return true;
            }
        }
    }
    false
}

/// True iff all 24 slots are set and at least 18 of them are strictly
/// less than `sample`. Always false when all samples are equal.
pub fn in_top_quartile(store: &impl NonVolatileStore, set: StatsSet, sample: u8) -> bool {
    let mut lower = 0u8;
    for hh in 0..24 {
        let v = store.read_byte(set.addr(hh));
        if v == STATS_UNSET {
            return false;
        }
        if v < sample {
            lower += 1;
            if lower >= QUARTILE_COUNT {
                return true;
            }
        }
    }
    false
}

/// Whether hour `hh` of `set` lies in the top (or bottom) quartile of the
/// set's own 24 values. False if any slot, including `hh`, is unset.
pub fn in_outlier_quartile(
    store: &impl NonVolatileStore,
    in_top: bool,
    set: StatsSet,
    hh: u8,
) -> bool {
    let Some(sample) = get_by_hour_stat(store, set, hh) else {
        return false;
    };
    if in_top {
        in_top_quartile(store, set, sample)
    } else {
        in_bottom_quartile(store, set, sample)
    }
}

/// Erase the stats area, at most `max_bytes` physical erases per call
/// (0 means 65536). Returns `true` once every byte is erased; call again
/// to resume otherwise.
pub fn zap_stats(store: &mut impl NonVolatileStore, max_bytes: u16) -> bool {
    let mut budget = u32::from(max_bytes);
    if budget == 0 {
        budget = 65_536;
    }
    for addr in STATS_START..=STATS_END {
        if store.smart_erase_byte(addr) {
            budget -= 1;
            if budget == 0 {
                debug!("zap_stats: budget exhausted at 0x{:03x}", addr);
                return false;
            }
        }
    }
    true
}
