//! Outbound and inbound stats payloads.

pub mod binary;
pub mod crc;
pub mod json;

pub use binary::{CoreStats, OccupancyCode, decode_core_stats, encode_core_stats};
pub use json::{StatsRotation, frame_json, verify_json_frame};

/// Largest frame either encoding can produce.
pub const STATS_MSG_MAX_LEN: usize = json::JSON_FRAME_MAX_BYTES;
