//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`NodeEvent`] as one tagged
//! line to the logger (UART / USB-CDC in production, stderr on the host).
//! A radio gateway would implement the same trait.

use core::fmt;

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;
use crate::payload::CoreStats;

/// Adapter that logs every [`NodeEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            NodeEvent::Started(s) | NodeEvent::Status(s) => {
                let tag = if matches!(event, NodeEvent::Started(_)) { "START " } else { "STATUS" };
                info!(
                    "{} | mode={} | target={}C | T={}C | valve={}%{} | \
                     occ={}% vac={}h | L={} | supply={}mV | boiler={} | overruns={}",
                    tag,
                    s.mode,
                    s.target_c,
                    CelsiusC16(s.temp_c16),
                    s.valve_pc,
                    if s.calling_for_heat { " +CFH" } else { "" },
                    s.occupancy_pc,
                    s.vacancy_h,
                    s.amb_light,
                    s.supply_mv,
                    if s.boiler_on { "ON" } else { "off" },
                    s.overruns,
                );
            }
            NodeEvent::ValveMoved { from_pc, to_pc, target_c } => {
                info!("VALVE  | {}% -> {}% | target={}C", from_pc, to_pc, target_c);
            }
            NodeEvent::Overrun { count } => {
                warn!("TICK   | overrun, total={}", count);
            }
            NodeEvent::NearOverrun => {
                info!("TICK   | near overrun, output skipped");
            }
            NodeEvent::RemoteCallForHeat { house_code } => {
                info!("HUB    | call for heat from {} {}", house_code >> 8, house_code & 0xff);
            }
            NodeEvent::Boiler { on } => {
                info!("HUB    | boiler {}", if *on { "ON" } else { "off" });
            }
            NodeEvent::StatsSent { binary, len } => {
                info!("STATS  | sent {} frame, {} bytes", if *binary { "binary" } else { "JSON" }, len);
            }
            NodeEvent::StatsAbandoned(e) => {
                warn!("STATS  | abandoned: {}", e);
            }
            NodeEvent::LinkFailed(e) => {
                warn!("LINK   | {}", e);
            }
            NodeEvent::RemoteStats(stats) => {
                info!("RX     | {}", RemoteStatsLine(stats));
            }
            NodeEvent::RemoteJson(text) => {
                info!("RX     | {}", text);
            }
            NodeEvent::Garbled { count } => {
                warn!("RX     | garbled frame, total={}", count);
            }
            NodeEvent::InboundDropped { count } => {
                warn!("RX     | queue full, dropped={}", count);
            }
        }
    }
}

// ── Host console logger ────────────────────────────────────────

/// Minimal `log` backend for host builds: level, target and message on
/// stderr. The ESP-IDF build uses `esp_idf_logger` instead.
#[cfg(not(target_os = "espidf"))]
pub struct ConsoleLogger {
    level: log::LevelFilter,
}

#[cfg(not(target_os = "espidf"))]
impl ConsoleLogger {
    /// Install as the global logger. Fails if one is already installed.
    pub fn init(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
        let logger: &'static ConsoleLogger = Box::leak(Box::new(Self { level }));
        log::set_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Sixteenths of a degree as signed decimal Celsius, two places.
struct CelsiusC16(i16);

impl fmt::Display for CelsiusC16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs >> 4, u32::from(abs & 0x0f) * 100 / 16)
    }
}

/// Compact dump of a received core record: `@id;T<C>C<sixteenths>;L<light>;O<occ>`.
struct RemoteStatsLine<'a>(&'a CoreStats);

impl fmt::Display for RemoteStatsLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        if let Some([id0, id1]) = s.id {
            write!(f, "@{:02x}{:02x}", id0, id1)?;
        }
        if let Some(t) = s.temp_c16 {
            write!(f, ";T{}C{}", t >> 4, t & 0xf)?;
        }
        if let Some(l) = s.amb_light {
            write!(f, ";L{}", l)?;
        }
        write!(f, ";O{}", s.occupancy as u8)?;
        if s.power_low {
            f.write_str(";B")?;
        }
        Ok(())
    }
}
