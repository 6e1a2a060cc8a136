//! Fuzz target: `verify_json_frame` and inbound dispatch
//!
//! Arbitrary bytes must never panic the verifier, and a verified body is
//! always printable text ending in a restored closing brace.
//!
//! cargo fuzz run fuzz_json_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use radvalve::payload::verify_json_frame;
use radvalve::scheduler::phases::decode_inbound;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = verify_json_frame(data) {
        let text = body.to_string();
        assert_eq!(text.len(), body.text_len());
        assert!(text.starts_with('{') && text.ends_with('}'));
        assert!(text.bytes().all(|b| (0x20..0x7f).contains(&b)));
    }
    let _ = decode_inbound(data);
});
