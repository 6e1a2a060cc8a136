//! Fuzz target: `decode_core_stats`
//!
//! Any record the decoder accepts must re-encode to exactly the bytes it
//! was decoded from.
//!
//! cargo fuzz run fuzz_core_stats

#![no_main]

use libfuzzer_sys::fuzz_target;
use radvalve::payload::binary::CORE_MAX_BYTES;
use radvalve::payload::{decode_core_stats, encode_core_stats};

fuzz_target!(|data: &[u8]| {
    if let Ok((stats, used)) = decode_core_stats(data) {
        assert!(used <= data.len() && used <= CORE_MAX_BYTES);
        let mut buf = [0u8; CORE_MAX_BYTES];
        let n = encode_core_stats(&mut buf, &stats).expect("decoded record must encode");
        assert_eq!(&buf[..n], &data[..used]);
    }
});
