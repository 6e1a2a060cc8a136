//! One-byte codecs for persisted statistics.
//!
//! Temperatures are range-compressed into a byte with three precision bands:
//!
//! | input (C)  | step    | compressed |
//! |------------|---------|------------|
//! | 0 ..16     | 1/2 C   | 0 ..32     |
//! | 16..24     | 1/8 C   | 32..96     |
//! | 24..100    | 1/2 C   | 96..=248   |
//!
//! Inputs below 0 C clamp to 0 and above 100 C clamp to 100, so the
//! compressed value can never collide with [`STATS_UNSET`].

use crate::app::ports::RandomSource;

use super::STATS_UNSET;

const LOW_THRESHOLD_C16: i32 = 16 << 4;
const LOW_THRESHOLD_AFTER: u8 = (LOW_THRESHOLD_C16 >> 3) as u8;
const HIGH_THRESHOLD_C16: i32 = 24 << 4;
const HIGH_THRESHOLD_AFTER: u8 =
    LOW_THRESHOLD_AFTER + ((HIGH_THRESHOLD_C16 - LOW_THRESHOLD_C16) >> 1) as u8;
const CEIL_C16: i32 = 100 << 4;
/// Largest compressed value.
pub const COMPRESSED_TEMP_MAX: u8 = HIGH_THRESHOLD_AFTER + ((CEIL_C16 - HIGH_THRESHOLD_C16) >> 3) as u8;

/// Bits of shift for the smoothing filter; larger is slower.
pub const STATS_SMOOTH_SHIFT: u8 = 3;

/// Compress a temperature in sixteenths of a degree C into one byte.
pub fn compress_temp_c16(temp_c16: i32) -> u8 {
    if temp_c16 <= 0 {
        return 0;
    }
    if temp_c16 < LOW_THRESHOLD_C16 {
        return (temp_c16 >> 3) as u8;
    }
    if temp_c16 < HIGH_THRESHOLD_C16 {
        return ((temp_c16 - LOW_THRESHOLD_C16) >> 1) as u8 + LOW_THRESHOLD_AFTER;
    }
    if temp_c16 < CEIL_C16 {
        return ((temp_c16 - HIGH_THRESHOLD_C16) >> 3) as u8 + HIGH_THRESHOLD_AFTER;
    }
    COMPRESSED_TEMP_MAX
}

/// Reverse [`compress_temp_c16`]. `None` for unset or invalid bytes.
pub fn expand_temp_c16(compressed: u8) -> Option<i16> {
    let c = i16::from(compressed);
    if compressed < LOW_THRESHOLD_AFTER {
        return Some(c << 3);
    }
    if compressed < HIGH_THRESHOLD_AFTER {
        return Some(((c - i16::from(LOW_THRESHOLD_AFTER)) << 1) + LOW_THRESHOLD_C16 as i16);
    }
    if compressed <= COMPRESSED_TEMP_MAX {
        return Some(((c - i16::from(HIGH_THRESHOLD_AFTER)) << 3) + HIGH_THRESHOLD_C16 as i16);
    }
    None
}

/// Width of the compression band containing `temp_c16`, in sixteenths.
pub fn compression_step_c16(temp_c16: i32) -> i32 {
    if (LOW_THRESHOLD_C16..HIGH_THRESHOLD_C16).contains(&temp_c16) {
        2
    } else {
        8
    }
}

/// Fold `new_value` into an exponentially smoothed byte.
///
/// A random addend below one unit of the shifted value gives stochastic
/// rounding, so sub-unit drift still accumulates over many updates. The
/// result never leaves the range spanned by the two inputs.
pub fn smooth_stats_value(old_smoothed: u8, new_value: u8, rng: &mut impl RandomSource) -> u8 {
    if old_smoothed == new_value {
        return old_smoothed;
    }
    let stoc_add = u16::from(rng.next_u8() & ((1 << STATS_SMOOTH_SHIFT) - 1));
    let old = u16::from(old_smoothed);
    (((old << STATS_SMOOTH_SHIFT) - old + u16::from(new_value) + stoc_add) >> STATS_SMOOTH_SHIFT)
        as u8
}

/// Rounded mean of at most two samples, as a byte.
pub fn smart_div_to_u8(total: u16, sample_count: u8) -> u8 {
    match sample_count {
        0 => STATS_UNSET,
        1 => total.min(254) as u8,
        2 => ((total + 1) >> 1) as u8,
        n => ((total + u16::from(n >> 1)) / u16::from(n)) as u8,
    }
}
