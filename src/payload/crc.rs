//! CRC-7 with polynomial 0x5B (0x37 in the shifted form used here).
//!
//! Good Hamming distance for the short frames sent over the air. The result
//! is 7 bits; frames map a zero CRC to 0x80 so a CRC byte is never 0x00 or
//! 0xFF.

const POLY: u8 = 0x37;

/// Fold one byte into a running CRC.
pub fn crc7_5b_update(mut crc: u8, datum: u8) -> u8 {
    let mut bit_mask = 0x80u8;
    while bit_mask != 0 {
        let mut bit = crc & 0x40 != 0;
        if datum & bit_mask != 0 {
            bit = !bit;
        }
        crc <<= 1;
        if bit {
            crc ^= POLY;
        }
        bit_mask >>= 1;
    }
    crc & 0x7f
}

/// CRC over `bytes` from `init`, with zero mapped to 0x80.
pub fn crc7_5b_frame(init: u8, bytes: &[u8]) -> u8 {
    match bytes.iter().fold(init, |crc, &b| crc7_5b_update(crc, b)) {
        0 => 0x80,
        crc => crc,
    }
}
