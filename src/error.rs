//! Unified error types for the radiator valve node.
//!
//! A single `Error` enum that every subsystem converts into. All variants
//! are `Copy` so they can be handed back from inside a tick without
//! allocation. Nothing here is fatal: callers log, count, and carry on with
//! the tick.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the node funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A settings request was out of range and has been rejected.
    Range(RangeError),
    /// The radio or valve link failed to deliver a frame.
    Link(LinkError),
    /// A stats payload could not be encoded or verified.
    Encode(EncodeError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range(e) => write!(f, "range: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Range errors
// ---------------------------------------------------------------------------

/// Rejected settings. Persisted state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// FROST target outside the legal range or above the WARM target.
    FrostTarget,
    /// WARM target outside the legal range or below the FROST target.
    WarmTarget,
    /// Targets come from the dial and cannot be set directly.
    NotSettable,
    /// Minimum valve percent open must be 1..=100.
    MinValveOpen,
    /// Schedule time past the end of the day.
    ScheduleTime,
    /// No such schedule slot.
    ScheduleSlot,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrostTarget => write!(f, "FROST target out of range"),
            Self::WarmTarget => write!(f, "WARM target out of range"),
            Self::NotSettable => write!(f, "target set by dial"),
            Self::MinValveOpen => write!(f, "min valve open out of range"),
            Self::ScheduleTime => write!(f, "schedule time out of range"),
            Self::ScheduleSlot => write!(f, "no such schedule slot"),
        }
    }
}

impl From<RangeError> for Error {
    fn from(e: RangeError) -> Self {
        Self::Range(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The transceiver refused or failed the transmission.
    TxFailed,
    /// Inbound frame failed its header or CRC checks.
    Garbled,
    /// The receive path reported an error code.
    Rx(u8),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TxFailed => write!(f, "TX failed"),
            Self::Garbled => write!(f, "garbled frame"),
            Self::Rx(code) => write!(f, "RX error {code}"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Encode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Output buffer cannot hold the frame.
    BufferTooSmall,
    /// Header byte does not describe a known record.
    BadHeader,
    /// Trailing CRC does not match the body.
    BadCrc,
    /// Frame is truncated or missing its terminator.
    Truncated,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::BadHeader => write!(f, "bad header"),
            Self::BadCrc => write!(f, "bad CRC"),
            Self::Truncated => write!(f, "truncated frame"),
        }
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_mark_lifts_sub_errors() {
        fn reject() -> Result<()> {
            Err(RangeError::WarmTarget)?
        }
        assert_eq!(reject(), Err(Error::Range(RangeError::WarmTarget)));
    }

    #[test]
    fn display_is_prefixed_by_category() {
        let e: Error = EncodeError::BadCrc.into();
        assert_eq!(format!("{e}"), "encode: bad CRC");
        let e: Error = LinkError::Rx(3).into();
        assert_eq!(format!("{e}"), "link: RX error 3");
    }
}
