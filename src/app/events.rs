//! Outbound node events.
//!
//! The scheduler and [`NodeService`](super::service::NodeService) emit
//! these through the [`EventSink`](super::ports::EventSink) port. Adapters
//! on the other side decide what to do with them: print a status line,
//! forward to a gateway, light an LED.

use heapless::String;

use crate::control::mode::Mode;
use crate::error::{EncodeError, LinkError};
use crate::payload::CoreStats;

/// Longest remote JSON body passed through.
pub const REMOTE_JSON_MAX: usize = 64;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The node has started (carries the initial status).
    Started(StatusSnapshot),

    /// Periodic or user-triggered status snapshot.
    Status(StatusSnapshot),

    /// The controller moved the valve this minute.
    ValveMoved { from_pc: u8, to_pc: u8, target_c: u8 },

    /// A tick ran past its boundary. Carries the persisted total.
    Overrun { count: u8 },

    /// The tick came close to its boundary; non-critical output was skipped.
    NearOverrun,

    /// A remote valve was heard calling for heat.
    RemoteCallForHeat { house_code: u16 },

    /// The boiler output turned on or off for remote valves.
    Boiler { on: bool },

    /// A stats frame went out.
    StatsSent { binary: bool, len: usize },

    /// A stats frame could not be built and nothing was sent.
    StatsAbandoned(EncodeError),

    /// The radio refused a frame.
    LinkFailed(LinkError),

    /// A binary stats record arrived from another node.
    RemoteStats(CoreStats),

    /// A JSON stats record arrived from another node and passed its CRC.
    RemoteJson(String<REMOTE_JSON_MAX>),

    /// An inbound frame failed its checks. Carries the running total.
    Garbled { count: u16 },

    /// The inbound queue has dropped frames. Carries the running total.
    InboundDropped { count: u16 },
}

/// A point-in-time view of the node, suitable for a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub mode: Mode,
    /// Target the controller is working to (C).
    pub target_c: u8,
    /// Room temperature (C/16).
    pub temp_c16: i16,
    pub valve_pc: u8,
    pub calling_for_heat: bool,
    /// Occupancy confidence, 0..=100.
    pub occupancy_pc: u8,
    pub vacancy_h: u8,
    pub amb_light: u8,
    pub supply_mv: u16,
    pub boiler_on: bool,
    /// Persisted overrun total.
    pub overruns: u8,
}
