//! Binary core stats record.
//!
//! ```text
//!   header   0110 0ITr   I: ID follows, T: temp/power follows
//!   [id0 id1]
//!   [tlo thi] tlo: 000P tttt (P: power low), thi: t >> 4
//!              t = temp_c16 + 320, 12 bits
//!   flags    0100 A0oo   A: ambient light follows, oo: occupancy
//!   [ambl]   1..=254
//!   crc      CRC-7/5B from 0x7F, zero sent as 0x80
//! ```

use crate::error::EncodeError;

use super::crc::crc7_5b_frame;

pub const HEADER_MSBS: u8 = 0x60;
const HEADER_MASK: u8 = 0xf9;
pub const HEADER_ID_PRESENT: u8 = 0x04;
pub const HEADER_TEMP_PRESENT: u8 = 0x02;

pub const FLAGS_MSBS: u8 = 0x40;
const FLAGS_MASK: u8 = 0xf4;
pub const FLAGS_AMBL_PRESENT: u8 = 0x08;

/// Initial CRC value for core records.
pub const CORE_CRC_INIT: u8 = 0x7f;
/// Largest encoded record.
pub const CORE_MAX_BYTES: usize = 8;

/// Offset applied so sub-zero temperatures encode unsigned (C/16).
const TEMP_OFFSET_C16: i16 = 20 << 4;
const TEMP_MAX_RAW: i16 = 0xfff;

/// Two-bit occupancy code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OccupancyCode {
    #[default]
    Undisclosed = 0,
    Vacant = 1,
    Possibly = 2,
    Likely = 3,
}

impl OccupancyCode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            1 => Self::Vacant,
            2 => Self::Possibly,
            3 => Self::Likely,
            _ => Self::Undisclosed,
        }
    }
}

/// Contents of a core record. Absent fields are not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreStats {
    pub id: Option<[u8; 2]>,
    /// Temperature (C/16), clamped to the encodable range.
    pub temp_c16: Option<i16>,
    /// Only sent alongside the temperature.
    pub power_low: bool,
    /// Ambient light, 1..=254.
    pub amb_light: Option<u8>,
    pub occupancy: OccupancyCode,
}

/// Encode `stats` into `buf`. Returns the number of bytes written.
/// Nothing useful is left in `buf` on error.
pub fn encode_core_stats(buf: &mut [u8], stats: &CoreStats) -> Result<usize, EncodeError> {
    let len = 2
        + if stats.id.is_some() { 2 } else { 0 }
        + if stats.temp_c16.is_some() { 2 } else { 0 }
        + usize::from(stats.amb_light.is_some())
        + 1;
    if buf.len() < len {
        return Err(EncodeError::BufferTooSmall);
    }

    let mut header = HEADER_MSBS;
    if stats.id.is_some() {
        header |= HEADER_ID_PRESENT;
    }
    if stats.temp_c16.is_some() {
        header |= HEADER_TEMP_PRESENT;
    }
    let mut n = 0;
    buf[n] = header;
    n += 1;
    if let Some([id0, id1]) = stats.id {
        buf[n] = id0;
        buf[n + 1] = id1;
        n += 2;
    }
    if let Some(temp) = stats.temp_c16 {
        let t = temp.saturating_add(TEMP_OFFSET_C16).clamp(0, TEMP_MAX_RAW) as u16;
        buf[n] = (t & 0x0f) as u8 | if stats.power_low { 0x10 } else { 0 };
        buf[n + 1] = (t >> 4) as u8;
        n += 2;
    }
    let mut flags = FLAGS_MSBS | stats.occupancy as u8;
    if stats.amb_light.is_some() {
        flags |= FLAGS_AMBL_PRESENT;
    }
    buf[n] = flags;
    n += 1;
    if let Some(amb) = stats.amb_light {
        buf[n] = amb.clamp(1, 254);
        n += 1;
    }
    buf[n] = crc7_5b_frame(CORE_CRC_INIT, &buf[..n]);
    Ok(n + 1)
}

fn take<'a>(buf: &'a [u8], n: &mut usize, count: usize) -> Result<&'a [u8], EncodeError> {
    let bytes = buf.get(*n..*n + count).ok_or(EncodeError::Truncated)?;
    *n += count;
    Ok(bytes)
}

/// Decode a core record from the front of `buf`. Returns the record and
/// the number of bytes it occupied.
pub fn decode_core_stats(buf: &[u8]) -> Result<(CoreStats, usize), EncodeError> {
    let header = *buf.first().ok_or(EncodeError::Truncated)?;
    if header & HEADER_MASK != HEADER_MSBS {
        return Err(EncodeError::BadHeader);
    }
    let mut stats = CoreStats::default();
    let mut n = 1;

    if header & HEADER_ID_PRESENT != 0 {
        let id = take(buf, &mut n, 2)?;
        stats.id = Some([id[0], id[1]]);
    }
    if header & HEADER_TEMP_PRESENT != 0 {
        let t = take(buf, &mut n, 2)?;
        if t[0] & 0xe0 != 0 {
            return Err(EncodeError::BadHeader);
        }
        let raw = (i16::from(t[1]) << 4) | i16::from(t[0] & 0x0f);
        stats.temp_c16 = Some(raw - TEMP_OFFSET_C16);
        stats.power_low = t[0] & 0x10 != 0;
    }
    let flags = take(buf, &mut n, 1)?[0];
    if flags & FLAGS_MASK != FLAGS_MSBS {
        return Err(EncodeError::BadHeader);
    }
    stats.occupancy = OccupancyCode::from_bits(flags);
    if flags & FLAGS_AMBL_PRESENT != 0 {
        let amb = take(buf, &mut n, 1)?[0];
        if amb == 0 || amb == 0xff {
            return Err(EncodeError::BadHeader);
        }
        stats.amb_light = Some(amb);
    }
    let body_len = n;
    let crc = take(buf, &mut n, 1)?[0];
    if crc != crc7_5b_frame(CORE_CRC_INIT, &buf[..body_len]) {
        return Err(EncodeError::BadCrc);
    }
    Ok((stats, body_len + 1))
}
