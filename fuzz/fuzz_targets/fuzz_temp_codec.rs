//! Fuzz target: stats byte codecs
//!
//! Compressed temperatures never collide with the unset marker and expand
//! back to within one band step; smoothing stays between its inputs.
//!
//! cargo fuzz run fuzz_temp_codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use radvalve::rng::Rng8;
use radvalve::stats::STATS_UNSET;
use radvalve::stats::codec::{compress_temp_c16, compression_step_c16, expand_temp_c16, smooth_stats_value};

fuzz_target!(|input: (i16, u8, u8, [u8; 3])| {
    let (temp_c16, old, new, seed) = input;
    let t = i32::from(temp_c16);

    let c = compress_temp_c16(t);
    assert_ne!(c, STATS_UNSET);
    let back = i32::from(expand_temp_c16(c).expect("compressed byte must expand"));
    let clamped = t.clamp(0, 100 << 4);
    assert!(back <= clamped && clamped - back < compression_step_c16(clamped));

    if old != STATS_UNSET && new != STATS_UNSET {
        let mut rng = Rng8::seeded(seed[0], seed[1], seed[2]);
        let s = smooth_stats_value(old, new, &mut rng);
        assert!(s >= old.min(new) && s <= old.max(new));
    }
});
