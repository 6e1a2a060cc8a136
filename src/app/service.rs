//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns the node state and the tick scheduler. The board
//! is passed in on every call, so the same service runs against real
//! hardware, the simulator and the test mocks.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!  Clock      ──▶ │      NodeService       │ ──▶ RadioPort
//!  UiPort     ──▶ │  Scheduler · NodeState │ ──▶ ValveLinkPort
//!  CliPort    ──▶ └────────────────────────┘ ──▶ NonVolatileStore
//! ```

use log::info;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::node::NodeState;
use crate::occupancy::OccupancyTracker;
use crate::scheduler::context::TickContext;
use crate::scheduler::{Scheduler, TickPhase};

use super::commands::{NodeCommand, apply_command};
use super::events::{NodeEvent, StatusSnapshot};
use super::ports::Platform;

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<P> {
    scheduler: Scheduler<P>,
    node: NodeState,
}

impl<P: Platform> NodeService<P> {
    /// Build the service. Nothing touches the board until [`start`](Self::start).
    pub fn new(config: NodeConfig, occupancy: &'static OccupancyTracker) -> Self {
        Self {
            scheduler: Scheduler::with_default_phases(),
            node: NodeState::new(config, occupancy),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Take first readings, announce the node and align with the RTC.
    ///
    /// A node that reports stats sends one binary and one JSON frame
    /// straight away so a listening hub learns of it without waiting for
    /// the first stats minute.
    pub fn start(&mut self, p: &mut P) {
        let config = &self.node.config;
        p.read_supply_mv();
        p.read_temperature_c16();
        let level = p.read_ambient_light();
        if config.temp_pot {
            p.read_temp_pot();
        }
        if config.humidity_sensor {
            p.read_humidity_pc();
        }
        self.node.ambient.update(level);
        self.node.reseed(p);
        self.node.compute_target_temperature(p);

        let status = self.node.status(p);
        info!(
            "node starting: mode={} target={}C temp={}C/16",
            status.mode, status.target_c, status.temp_c16
        );
        p.emit(&NodeEvent::Started(status));

        if self.node.config.stats_tx {
            let _ = self.node.transmit_stats(p, true, true, false);
            if self.node.config.json_stats {
                let _ = self.node.transmit_stats(p, false, true, false);
            }
        }

        self.node.time_lsd = p.seconds_of_minute();
        let mut ctx = TickContext::new(p, &mut self.node);
        self.scheduler.start(&mut ctx);
    }

    /// Run one tick: sleep to the next RTC boundary, then every phase.
    pub fn tick(&mut self, p: &mut P) {
        let mut ctx = TickContext::new(p, &mut self.node);
        self.scheduler.run_tick(&mut ctx);
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a command arriving outside the tick's own UI and CLI polls.
    /// The new target takes effect at once.
    pub fn handle_command(&mut self, p: &mut P, cmd: NodeCommand) -> Result<()> {
        apply_command(&mut self.node, p, cmd)?;
        self.node.compute_target_temperature(p);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn node(&self) -> &NodeState {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut NodeState {
        &mut self.node
    }

    pub fn status(&self, p: &P) -> StatusSnapshot {
        self.node.status(p)
    }

    pub fn current_phase(&self) -> TickPhase {
        self.scheduler.current_phase()
    }

    /// Ticks completed since start.
    pub fn tick_count(&self) -> u32 {
        self.scheduler.tick_count()
    }
}
