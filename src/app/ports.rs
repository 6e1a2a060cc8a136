//! Port traits: the hexagonal boundary between the control core and its
//! collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Sensor drivers, the radio, the valve link, the NV byte store, the RTC and
//! the UI/CLI layers all live on the far side of these traits. The scheduler
//! consumes them through the [`Platform`] bundle, so the core never touches
//! hardware directly and every tick can be replayed against mocks.
//!
//! ## Contract notes
//!
//! - **NonVolatileStore** is single-writer: only the main loop calls the
//!   mutating methods. Interrupt handlers never touch it.
//! - **UiPort** and **CliPort** hand over commands that are already
//!   debounced. The core applies them without further filtering.

use heapless::Vec;

use crate::config::NodeConfig;
use crate::error::LinkError;

use super::commands::NodeCommand;
use super::events::NodeEvent;

// ───────────────────────────────────────────────────────────────
// Non-volatile byte store (driven adapter: domain ↔ EEPROM)
// ───────────────────────────────────────────────────────────────

/// Erased byte value.
pub const NV_ERASED: u8 = 0xFF;

/// Byte-addressed persistent store with wear-minimising writes.
pub trait NonVolatileStore {
    /// Read one byte; erased cells read as [`NV_ERASED`].
    fn read_byte(&self, addr: u16) -> u8;

    /// Write `value` only if it differs from the stored byte.
    /// Returns `true` if a physical write happened.
    fn smart_update_byte(&mut self, addr: u16, value: u8) -> bool;

    /// Erase the byte only if it is not already erased.
    /// Returns `true` if a physical erase happened.
    fn smart_erase_byte(&mut self, addr: u16) -> bool;

    /// Clear the bits that are zero in `mask`, leaving the rest untouched.
    fn smart_clear_bits(&mut self, addr: u16, mask: u8) -> bool {
        let current = self.read_byte(addr);
        self.smart_update_byte(addr, current & mask)
    }
}

// ───────────────────────────────────────────────────────────────
// Real-time clock
// ───────────────────────────────────────────────────────────────

/// Local wall-clock time, kept by the RTC collaborator across resets.
pub trait Clock {
    /// Seconds within the current minute, 0..=59.
    fn seconds_of_minute(&self) -> u8;
    /// Minutes within the current hour, 0..=59.
    fn minutes_of_hour(&self) -> u8;
    /// Hour of the day, 0..=23.
    fn hours_of_day(&self) -> u8;
    /// Fraction of the current tick already used, 0..=255.
    fn sub_cycle_time(&self) -> u8;

    /// Minutes since local midnight.
    fn minutes_since_midnight(&self) -> u16 {
        u16::from(self.hours_of_day()) * 60 + u16::from(self.minutes_of_hour())
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Each sensor has a `read_*` that samples the hardware and caches the
/// result, and a plain accessor that returns the cached value.
pub trait SensorPort {
    /// Sample room temperature, in sixteenths of a degree C.
    fn read_temperature_c16(&mut self) -> i16;
    fn temperature_c16(&self) -> i16;

    /// Sample raw ambient light, 0 (dark) ..= 255 (bright).
    fn read_ambient_light(&mut self) -> u8;
    fn ambient_light(&self) -> u8;

    /// Sample relative humidity in percent, 0..=100.
    fn read_humidity_pc(&mut self) -> u8;
    fn humidity_pc(&self) -> u8;
    /// Humidity is high enough to raise the frost floor.
    fn is_humidity_high(&self) -> bool;

    /// Sample supply voltage in millivolts.
    fn read_supply_mv(&mut self) -> u16;
    fn supply_mv(&self) -> u16;
    fn is_supply_low(&self) -> bool;
    /// Running from mains: battery level is not worth reporting.
    fn is_mains_powered(&self) -> bool;

    /// Sample the temperature dial, 0..=255.
    fn read_temp_pot(&mut self) -> u8;
    fn temp_pot(&self) -> u8;

    /// Returns `true` if voice activity was detected since the last read.
    fn read_voice(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Valve link (remote valve protocol + boiler call eavesdropping)
// ───────────────────────────────────────────────────────────────

/// Link-layer driver for a remote valve head. Transmission is split into
/// half-second slots within each tick; the core only decides when to poll.
pub trait ValveLinkPort {
    /// The link is configured with house codes.
    fn is_enabled(&self) -> bool;
    fn is_synced(&self) -> bool;
    /// House code pair used as the node ID on the link.
    fn house_codes(&self) -> (u8, u8);

    /// First TX slot of the tick. Returns `true` if further slots in this
    /// tick should also be polled.
    fn poll_sync_and_tx_first(&mut self, double_tx: bool) -> bool;
    /// Subsequent TX slot. Returns `true` if more slots are wanted.
    fn poll_sync_and_tx_next(&mut self, double_tx: bool) -> bool;
    /// Drop sync state and restart the sync sequence.
    fn sync_and_tx_reset(&mut self);
    /// Prepare the next valve-set frame, optionally with piggybacked stats.
    fn create_valve_set_frame(&mut self, percent_open: u8, with_stats: bool);

    /// Poll the receiver for a call for heat between sleeps.
    fn call_for_heat_poll(&mut self) -> bool;
    /// Take the house code of the last heard call for heat, if any.
    fn call_for_heat_heard_get_and_clear(&mut self) -> Option<u16>;
    /// Take and clear the last receive error code (0 = none).
    fn last_rx_error_get_and_clear(&mut self) -> u8;
    /// Start listening. Returns `true` if the receiver was newly enabled.
    fn setup_to_eavesdrop(&mut self, second0: bool) -> bool;
    fn stop_eavesdrop(&mut self, second0: bool);
}

// ───────────────────────────────────────────────────────────────
// Radio port (stats frames)
// ───────────────────────────────────────────────────────────────

/// Largest inbound frame accepted from the receive queue.
pub const MAX_INBOUND_FRAME: usize = 64;

/// A raw frame popped from the receive queue.
pub type InboundFrame = Vec<u8, MAX_INBOUND_FRAME>;

pub trait RadioPort {
    /// Send one frame. `double_tx` repeats it for robustness; `resume_rx`
    /// returns the receiver to listening afterwards.
    fn transmit(&mut self, frame: &[u8], double_tx: bool, resume_rx: bool)
    -> Result<(), LinkError>;
    /// Signal strength of the last received frame.
    fn rssi(&self) -> u8;
    /// Pop the oldest received stats frame.
    fn pop_inbound(&mut self) -> Option<InboundFrame>;
    /// Frames dropped because the receive queue was full.
    fn inbound_overruns(&self) -> u16;
    /// Put the transceiver in standby and clear its receive buffers.
    fn standby_and_clear(&mut self);
}

// ───────────────────────────────────────────────────────────────
// UI and CLI ports (already-debounced user input)
// ───────────────────────────────────────────────────────────────

pub trait UiPort {
    /// Run the UI for this second; returns a debounced command if one was made.
    fn poll_ui(&mut self, second: u8) -> Option<NodeCommand>;
    /// Manual control used in the last few minutes.
    fn recent_control_use(&self) -> bool;
    /// Manual control used in the last minute or so.
    fn very_recent_control_use(&self) -> bool;
}

pub trait CliPort {
    /// A human is driving the serial console.
    fn is_cli_active(&self) -> bool;
    /// Listen for a command until sub-cycle time `until_sct`.
    fn poll_cli(&mut self, until_sct: u8) -> Option<NodeCommand>;
}

// ───────────────────────────────────────────────────────────────
// Power port (sleep and outputs)
// ───────────────────────────────────────────────────────────────

pub trait PowerPort {
    /// Sleep until the next RTC or radio interrupt.
    fn sleep_until_interrupt(&mut self);
    /// Short nap that also services the receiver. Returns `true` if a frame arrived.
    fn nap_and_poll(&mut self) -> bool;
    /// Turn off everything not needed while sleeping.
    fn minimise_power(&mut self);
    fn sleep_low_power_ms(&mut self, ms: u8);
    /// Drive the boiler call-for-heat output.
    fn set_heat_call_output(&mut self, on: bool);
    /// Free-running cycle counter, for entropy.
    fn cycle_count(&self) -> u8;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`NodeEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &NodeEvent);
}

// ───────────────────────────────────────────────────────────────
// Randomness
// ───────────────────────────────────────────────────────────────

/// Source of cheap pseudo-random bytes. Injected wherever the core needs
/// jitter or stochastic rounding so those paths stay deterministic in tests.
pub trait RandomSource {
    fn next_u8(&mut self) -> u8;

    fn next_bool(&mut self) -> bool {
        self.next_u8() & 0x80 != 0
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the node capability set.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration; [`NodeConfig::default()`] if none is stored.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Everything the scheduler needs from the board, as one generic bound.
pub trait Platform:
    NonVolatileStore
    + Clock
    + SensorPort
    + ValveLinkPort
    + RadioPort
    + UiPort
    + CliPort
    + PowerPort
    + EventSink
{
}

impl<T> Platform for T where
    T: NonVolatileStore
        + Clock
        + SensorPort
        + ValveLinkPort
        + RadioPort
        + UiPort
        + CliPort
        + PowerPort
        + EventSink
{
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
