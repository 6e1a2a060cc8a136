//! Rotating JSON stats record.
//!
//! A small keyed set of integer stats. Each message carries the node ID
//! (`"@"`), a 4-bit sequence number (`"+"`), every changed stat that fits
//! and at least one unchanged stat taken in rotation, so every value is
//! refreshed eventually even when nothing changes.
//!
//! On the air the closing `}` has its top bit set, then a CRC-7/5B byte
//! (from 0, zero sent as 0x80) and a 0xFF terminator follow.

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::error::EncodeError;

use super::crc::crc7_5b_frame;

/// Longest JSON text, braces included.
pub const MSG_JSON_MAX_LENGTH: usize = 55;
/// Room for the text plus CRC and terminator.
pub const JSON_FRAME_MAX_BYTES: usize = MSG_JSON_MAX_LENGTH + 2;
pub const JSON_CRC_INIT: u8 = 0;
pub const FRAME_TERMINATOR: u8 = 0xff;
const CLOSE_MARK: u8 = b'}' | 0x80;

#[derive(Debug, Clone)]
struct StatItem {
    key: &'static str,
    value: i16,
    changed: bool,
}

/// Up to `N` stats, sent a few at a time.
#[derive(Debug, Clone)]
pub struct StatsRotation<const N: usize> {
    items: Vec<StatItem, N>,
    last_unchanged: usize,
    seq: u8,
}

impl<const N: usize> Default for StatsRotation<N> {
    fn default() -> Self {
        Self::new()
    }
}

struct Cursor<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl Write for Cursor<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        let dst = self.buf.get_mut(self.len..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

impl<const N: usize> StatsRotation<N> {
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            last_unchanged: 0,
            seq: 0,
        }
    }

    /// Set a stat, marking it changed if new or different.
    /// Returns `false` if the set is full and `key` is not in it.
    pub fn put(&mut self, key: &'static str, value: i16) -> bool {
        if let Some(item) = self.items.iter_mut().find(|i| i.key == key) {
            if item.value != value {
                item.value = value;
                item.changed = true;
            }
            return true;
        }
        self.items
            .push(StatItem {
                key,
                value,
                changed: true,
            })
            .is_ok()
    }

    pub fn remove(&mut self, key: &'static str) {
        if let Some(pos) = self.items.iter().position(|i| i.key == key) {
            self.items.remove(pos);
        }
    }

    pub fn get(&self, key: &str) -> Option<i16> {
        self.items.iter().find(|i| i.key == key).map(|i| i.value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stats changed since they were last sent.
    pub fn changed_count(&self) -> usize {
        self.items.iter().filter(|i| i.changed).count()
    }

    /// Write the next message into `buf` (plain JSON, not yet framed).
    /// With `maximise` unchanged stats are added until the message is full.
    pub fn write_json(&mut self, buf: &mut [u8], id: Option<[u8; 2]>, maximise: bool) -> Result<usize, EncodeError> {
        let cap = buf.len().min(MSG_JSON_MAX_LENGTH);
        let mut out = Cursor {
            buf: &mut buf[..cap],
            len: 0,
        };
        let seq = self.seq;
        let head = match id {
            Some([a, b]) => write!(out, "{{\"@\":\"{a:02x}{b:02x}\",\"+\":{seq}"),
            None => write!(out, "{{\"+\":{seq}"),
        };
        // Always leave room for the closing brace.
        if head.is_err() || out.len >= cap {
            return Err(EncodeError::BufferTooSmall);
        }
        self.seq = (self.seq + 1) & 0x0f;

        let mut sent = [false; N];

        for (idx, item) in self.items.iter_mut().enumerate() {
            if item.changed && Self::append(&mut out, cap, item) {
                item.changed = false;
                sent[idx] = true;
            }
        }

        let n = self.items.len();
        for step in 1..=n {
            let idx = (self.last_unchanged + step) % n;
            if sent[idx] || self.items[idx].changed {
                continue;
            }
            if Self::append(&mut out, cap, &self.items[idx]) {
                self.last_unchanged = idx;
                if !maximise {
                    break;
                }
            }
        }

        out.write_str("}").map_err(|_| EncodeError::BufferTooSmall)?;
        Ok(out.len)
    }

    fn append(out: &mut Cursor<'_>, cap: usize, item: &StatItem) -> bool {
        let mut field: String<32> = String::new();
        if write!(field, ",\"{}\":{}", item.key, item.value).is_err() {
            return false;
        }
        if out.len + field.len() + 1 > cap {
            return false;
        }
        out.write_str(&field).is_ok()
    }
}

/// Turn the `len`-byte JSON text at the front of `buf` into an on-air
/// frame. Returns the framed length.
pub fn frame_json(buf: &mut [u8], len: usize) -> Result<usize, EncodeError> {
    if len < 2 || buf.first() != Some(&b'{') || buf.get(len - 1) != Some(&b'}') {
        return Err(EncodeError::BadHeader);
    }
    if buf.len() < len + 2 {
        return Err(EncodeError::BufferTooSmall);
    }
    buf[len - 1] = CLOSE_MARK;
    buf[len] = crc7_5b_frame(JSON_CRC_INIT, &buf[..len]);
    buf[len + 1] = FRAME_TERMINATOR;
    Ok(len + 2)
}

/// Verified JSON text from a received frame, minus its closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonBody<'a> {
    open: &'a str,
}

impl JsonBody<'_> {
    /// Length of the restored JSON text.
    pub fn text_len(&self) -> usize {
        self.open.len() + 1
    }
}

impl fmt::Display for JsonBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}}}", self.open)
    }
}

/// Check a received JSON frame: printable body, marked close, CRC and
/// terminator.
pub fn verify_json_frame(frame: &[u8]) -> Result<JsonBody<'_>, EncodeError> {
    if frame.first() != Some(&b'{') {
        return Err(EncodeError::BadHeader);
    }
    let close = frame
        .iter()
        .take(MSG_JSON_MAX_LENGTH)
        .position(|&b| b == CLOSE_MARK)
        .ok_or(EncodeError::Truncated)?;
    let body = &frame[..close];
    if !body.iter().all(|b| (0x20..0x7f).contains(b)) {
        return Err(EncodeError::BadHeader);
    }
    let crc = *frame.get(close + 1).ok_or(EncodeError::Truncated)?;
    if crc != crc7_5b_frame(JSON_CRC_INIT, &frame[..=close]) {
        return Err(EncodeError::BadCrc);
    }
    if frame.get(close + 2) != Some(&FRAME_TERMINATOR) {
        return Err(EncodeError::Truncated);
    }
    let open = core::str::from_utf8(body).map_err(|_| EncodeError::BadHeader)?;
    Ok(JsonBody { open })
}
