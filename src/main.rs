//! Radiator valve node, simulation runner.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimBoard (all board ports)   LogEventSink   NvsAdapter        │
//! │  SimClock / RtcClock          HeatCallOutput (OutputPin)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Scheduler · Mode · Policy · Valve · Occupancy · Stats │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `radvalve [config.json] [minutes]`. Runs the node against the
//! simulated room, starting at 06:30 with the user switching to WARM.
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::info;

use radvalve::adapters::sim::SimBoard;
use radvalve::app::commands::NodeCommand;
use radvalve::app::ports::{ConfigPort, SensorPort};
use radvalve::app::service::NodeService;
use radvalve::config::NodeConfig;
use radvalve::occupancy::OccupancyTracker;

/// Updated from interrupt context on hardware; one per node.
static OCCUPANCY: OccupancyTracker = OccupancyTracker::new();

const DEFAULT_RUN_MINUTES: u32 = 90;

fn init_logging() -> Result<()> {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    #[cfg(not(target_os = "espidf"))]
    radvalve::adapters::log_sink::ConsoleLogger::init(log::LevelFilter::Info)
        .map_err(|e| anyhow::anyhow!("logger: {e}"))?;

    Ok(())
}

fn load_config(board: &SimBoard, path: Option<&str>) -> Result<NodeConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            let config = NodeConfig::from_json(&text).map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
            board
                .nvs
                .save(&config)
                .map_err(|e| anyhow::anyhow!("saving config: {e}"))?;
            Ok(config)
        }
        None => board.nvs.load().map_err(|e| anyhow::anyhow!("loading config: {e}")),
    }
}

fn main() -> Result<()> {
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RadValve v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let minutes = match args.get(1) {
        Some(m) => m.parse::<u32>().context("minutes must be a number")?,
        None => DEFAULT_RUN_MINUTES,
    };

    let mut board = SimBoard::new(1);
    board.nvs = radvalve::adapters::nvs::NvsAdapter::open().map_err(|e| anyhow::anyhow!("NVS: {e}"))?;
    let config = load_config(&board, args.first().map(String::as_str))?;
    board.clock = radvalve::adapters::time::SimClock::new(config.tick_seconds());
    board.link_enabled = config.local_trv;
    board.clock.set_time(6, 30, 0);
    board.read_supply_mv();

    let ticks = minutes * 60 / u32::from(config.tick_seconds());
    let mut service: NodeService<SimBoard> = NodeService::new(config, &OCCUPANCY);
    service.start(&mut board);
    board.ui_commands.push_back(NodeCommand::SetWarmMode(true));

    for _ in 0..ticks {
        service.tick(&mut board);
        if service.node().time_lsd == 0 {
            board.nvs.flush().map_err(|e| anyhow::anyhow!("NVS flush: {e}"))?;
        }
    }

    let status = service.status(&board);
    info!(
        "done after {} ticks: mode={} T={}C/16 valve={}% frames sent={}",
        service.tick_count(),
        status.mode,
        status.temp_c16,
        status.valve_pc,
        board.sent.len()
    );
    Ok(())
}
