//! Phase handlers and the table builder.
//!
//! ```text
//!  SLEEP ──▶ TX_WINDOW_0 ──▶ UI_POLL ──▶ TX_WINDOW_1 ──▶ MINUTE_TASK
//!    ▲                                                       │
//!    │                                                       ▼
//!  (overrun check) ◀── CLI_POLL ◀── TX_WINDOW_3 ◀── STATUS_REPORT ◀── TX_WINDOW_2
//! ```
//!
//! The valve link gets the first half-second of every tick. Its later
//! windows are only offered while it keeps asking for them, and the last
//! two only exist on a two-second tick.

use core::fmt::Write;

use heapless::String;
use log::{debug, info, warn};

use crate::app::commands::apply_command;
use crate::app::events::{NodeEvent, REMOTE_JSON_MAX};
use crate::app::ports::Platform;
use crate::error::{EncodeError, LinkError};
use crate::node::record_overrun;
use crate::payload::{decode_core_stats, verify_json_frame};

use super::context::{NEAR_OVERRUN_THRESHOLD, TickContext, TickFlags};
use super::hub::{BoilerChange, EavesdropInputs, min_boiler_on_minutes};
use super::minute_tasks::run_minute_task;
use super::{PhaseDescriptor, TickPhase};

/// Sub-cycle time the CLI listens for when no human is attached.
pub const CLI_POLL_MIN_SCT: u8 = 25;
/// Sub-cycle time a human CLI session may listen until.
pub const CLI_POLL_HUMAN_UNTIL_SCT: u8 = u8::MAX - CLI_POLL_MIN_SCT;
/// No CLI poll starts at or after this sub-cycle time.
pub const CLI_POLL_LATEST_SCT: u8 = u8::MAX - 2 * CLI_POLL_MIN_SCT;

/// Valve position at which frames to the valve are sent twice.
pub const DOUBLE_TX_MIN_VALVE_PC: u8 = 50;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the phase table. Called once at start-up.
pub fn build_phase_table<P: Platform>() -> [PhaseDescriptor<P>; TickPhase::COUNT] {
    [
        PhaseDescriptor {
            id: TickPhase::Sleep,
            name: "Sleep",
            on_enter: None,
            on_exit: None,
            on_update: sleep_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::TxWindow0,
            name: "TxWindow0",
            on_enter: None,
            on_exit: None,
            on_update: tx_window0_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::UiPoll,
            name: "UiPoll",
            on_enter: None,
            on_exit: None,
            on_update: ui_poll_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::TxWindow1,
            name: "TxWindow1",
            on_enter: None,
            on_exit: None,
            on_update: tx_window1_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::MinuteTask,
            name: "MinuteTask",
            on_enter: None,
            on_exit: None,
            on_update: minute_task_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::TxWindow2,
            name: "TxWindow2",
            on_enter: None,
            on_exit: None,
            on_update: tx_window2_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::StatusReport,
            name: "StatusReport",
            on_enter: None,
            on_exit: None,
            on_update: status_report_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::TxWindow3,
            name: "TxWindow3",
            on_enter: None,
            on_exit: None,
            on_update: tx_window3_update::<P>,
        },
        PhaseDescriptor {
            id: TickPhase::CliPoll,
            name: "CliPoll",
            on_enter: None,
            on_exit: Some(cli_poll_exit::<P>),
            on_update: cli_poll_update::<P>,
        },
    ]
}

/// True if the tick is close enough to its end that optional output
/// should be skipped. Latches [`TickFlags::too_near_overrun`].
pub(super) fn near_overrun<P: Platform>(ctx: &mut TickContext<'_, P>) -> bool {
    if ctx.platform.sub_cycle_time() >= NEAR_OVERRUN_THRESHOLD {
        ctx.flags.too_near_overrun = true;
        return true;
    }
    false
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEP
// ═══════════════════════════════════════════════════════════════════════════

fn sleep_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    derive_tick_flags(ctx);
    drain_inbound(ctx);
    listen_for_calls(ctx);

    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let heat_call = node.hub.boiler_on() || node.is_valve_really_open(p);
    p.set_heat_call_output(heat_call);
    p.minimise_power();

    sleep_until_next_tick(ctx);
    TickPhase::TxWindow0
}

fn derive_tick_flags<P: Platform>(ctx: &mut TickContext<'_, P>) {
    let p = &*ctx.platform;
    let node = &*ctx.node;
    ctx.flags = TickFlags {
        second0: node.time_lsd == 0,
        minute_from_4: node.minute_count & 3,
        battery_low: p.is_supply_low(),
        conserve_battery: node.should_conserve_battery(p),
        hub_mode: node.in_hub_mode(p),
        ..TickFlags::default()
    };
}

/// Pass on one waiting stats frame from another node, if there is time.
fn drain_inbound<P: Platform>(ctx: &mut TickContext<'_, P>) {
    if !ctx.node.config.hub_listen || near_overrun(ctx) {
        return;
    }
    let Some(frame) = ctx.platform.pop_inbound() else {
        return;
    };
    match decode_inbound(&frame) {
        Ok(event) => ctx.platform.emit(&event),
        Err(e) => {
            let node = &mut *ctx.node;
            node.garbled_frames = node.garbled_frames.saturating_add(1);
            warn!("inbound: dropped frame ({}), {} so far", e, node.garbled_frames);
            ctx.platform.emit(&NodeEvent::Garbled {
                count: node.garbled_frames,
            });
        }
    }
}

/// JSON frames start with `{`; anything else must be a binary record.
pub fn decode_inbound(frame: &[u8]) -> Result<NodeEvent, EncodeError> {
    if frame.first() == Some(&b'{') {
        let body = verify_json_frame(frame)?;
        let mut text: String<REMOTE_JSON_MAX> = String::new();
        write!(text, "{body}").map_err(|_| EncodeError::BufferTooSmall)?;
        return Ok(NodeEvent::RemoteJson(text));
    }
    let (stats, _) = decode_core_stats(frame)?;
    Ok(NodeEvent::RemoteStats(stats))
}

/// Hub duties: take any heard call for heat, run the boiler countdown and
/// decide whether the receiver stays on for the coming tick.
fn listen_for_calls<P: Platform>(ctx: &mut TickContext<'_, P>) {
    let second0 = ctx.flags.second0;
    if !ctx.flags.hub_mode {
        if ctx.node.hub.is_eavesdropping() {
            ctx.platform.stop_eavesdrop(second0);
            ctx.node.hub.set_eavesdropping(false);
        }
        return;
    }

    ctx.platform.call_for_heat_poll();
    let heard = ctx.platform.call_for_heat_heard_get_and_clear();
    if !near_overrun(ctx) {
        let p = &mut *ctx.platform;
        match heard {
            Some(house_code) => {
                info!("hub: call for heat from {} {}", house_code >> 8, house_code & 0xff);
                p.emit(&NodeEvent::RemoteCallForHeat { house_code });
            }
            None => {
                let err = p.last_rx_error_get_and_clear();
                if err != 0 {
                    warn!("hub: RX error {}", err);
                    p.emit(&NodeEvent::LinkFailed(LinkError::Rx(err)));
                }
            }
        }
    }

    let min_on_m = min_boiler_on_minutes(&*ctx.platform);
    let tick_seconds = ctx.node.tick_seconds();
    let change = ctx.node.hub.record(heard.is_some(), min_on_m, tick_seconds, second0);
    if let Some(change) = change {
        if !near_overrun(ctx) {
            let on = change == BoilerChange::On;
            info!("hub: boiler {}", if on { "on" } else { "off" });
            ctx.platform.emit(&NodeEvent::Boiler { on });
        }
    }

    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let inputs = EavesdropInputs {
        local_valve: node.valve_link_active(p),
        battery_low: ctx.flags.battery_low,
        heard: heard.is_some(),
        minute0_from_4: ctx.flags.minute0_from_4(),
        minute_count: node.minute_count,
        tick_seconds,
    };
    let listen = node.hub.needs_to_eavesdrop(&inputs);
    if listen {
        if p.setup_to_eavesdrop(second0) {
            debug!("hub: receiver on");
        }
        if let Some(count) = node.hub.dropped_changed(p.inbound_overruns()) {
            warn!("hub: {} inbound frames dropped", count);
            p.emit(&NodeEvent::InboundDropped { count });
        }
    } else {
        p.stop_eavesdrop(second0);
        // Anything caught while shutting down would be stale next time.
        let _ = p.call_for_heat_heard_get_and_clear();
    }
    node.hub.set_eavesdropping(listen);
}

/// Block until the RTC moves on to the next tick, then adopt it.
fn sleep_until_next_tick<P: Platform>(ctx: &mut TickContext<'_, P>) {
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let eavesdropping = node.hub.is_eavesdropping();
    while node.time_lsd == p.seconds_of_minute() {
        if eavesdropping {
            p.nap_and_poll();
            continue;
        }
        if ctx.flags.battery_low || ctx.flags.second0 {
            p.standby_and_clear();
        }
        p.sleep_until_interrupt();
    }
    node.time_lsd = p.seconds_of_minute();

    if eavesdropping {
        let rssi = p.rssi();
        if rssi != 0 {
            node.rng.seed(rssi, p.cycle_count(), node.time_lsd);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TX windows
// ═══════════════════════════════════════════════════════════════════════════

fn tx_window0_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    if ctx.flags.too_near_overrun {
        warn!("tick: near overrun");
        ctx.platform.emit(&NodeEvent::NearOverrun);
    }
    let p = &mut *ctx.platform;
    let node = &*ctx.node;
    let double_tx = !ctx.flags.conserve_battery
        && !ctx.flags.hub_mode
        && node.radiator.valve_pc() >= DOUBLE_TX_MIN_VALVE_PC;
    ctx.flags.double_tx = double_tx;
    ctx.flags.use_extra_tx_slots = node.valve_link_active(p) && p.poll_sync_and_tx_first(double_tx);
    TickPhase::UiPoll
}

/// Offer the valve link another window if it still wants one.
fn offer_next_tx_window<P: Platform>(ctx: &mut TickContext<'_, P>) {
    if ctx.flags.use_extra_tx_slots {
        let p = &mut *ctx.platform;
        ctx.flags.use_extra_tx_slots = ctx.node.valve_link_active(p) && p.poll_sync_and_tx_next(ctx.flags.double_tx);
    }
}

fn tx_window1_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    offer_next_tx_window(ctx);
    TickPhase::MinuteTask
}

fn tx_window2_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    if ctx.node.config.two_second_tick {
        offer_next_tx_window(ctx);
    }
    TickPhase::StatusReport
}

fn tx_window3_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    if ctx.node.config.two_second_tick {
        offer_next_tx_window(ctx);
    }
    TickPhase::CliPoll
}

// ═══════════════════════════════════════════════════════════════════════════
//  UI, minute tasks, status
// ═══════════════════════════════════════════════════════════════════════════

/// UI runs every other second (every tick on a two-second clock). A change
/// forces a status line and an immediate target recompute.
fn ui_poll_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let mut recompute = false;
    if node.config.two_second_tick || node.time_lsd & 1 == 0 {
        if let Some(cmd) = p.poll_ui(node.time_lsd) {
            // Rejections are logged where they happen.
            let _ = apply_command(node, p, cmd);
            ctx.flags.show_status = true;
            recompute = true;
        }
    }
    if recompute || p.very_recent_control_use() {
        node.compute_target_temperature(p);
    }
    TickPhase::TxWindow1
}

fn minute_task_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    ctx.flags.run_all = !ctx.flags.conserve_battery || ctx.flags.minute0_from_4();
    run_minute_task(ctx);
    TickPhase::TxWindow2
}

fn status_report_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    if ctx.flags.show_status {
        let status = ctx.node.status(&*ctx.platform);
        ctx.platform.emit(&NodeEvent::Status(status));
    }
    TickPhase::TxWindow3
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLI and overrun check
// ═══════════════════════════════════════════════════════════════════════════

fn cli_poll_update<P: Platform>(ctx: &mut TickContext<'_, P>) -> TickPhase {
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let human = p.is_cli_active();
    if ctx.flags.show_status || human {
        let sct = p.sub_cycle_time();
        if sct < CLI_POLL_LATEST_SCT {
            let until = if human {
                CLI_POLL_HUMAN_UNTIL_SCT
            } else {
                sct + CLI_POLL_MIN_SCT
            };
            if let Some(cmd) = p.poll_cli(until) {
                let _ = apply_command(node, p, cmd);
            }
        }
    }
    node.continue_zap(p);
    TickPhase::Sleep
}

/// If the RTC has already moved on, this tick overran: count it, resync
/// the valve link and adopt the new second so the next sleep is not
/// skipped.
fn cli_poll_exit<P: Platform>(ctx: &mut TickContext<'_, P>) {
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let now = p.seconds_of_minute();
    if now == node.time_lsd {
        return;
    }
    let count = record_overrun(p);
    warn!("tick: overrun, second {} ended at {} ({} total)", node.time_lsd, now, count);
    p.sync_and_tx_reset();
    node.time_lsd = now;
    p.emit(&NodeEvent::Overrun { count });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{CoreStats, OccupancyCode, encode_core_stats, frame_json};

    #[test]
    fn decodes_binary_record() {
        let stats = CoreStats {
            id: Some([0x12, 0x34]),
            temp_c16: Some(19 * 16 + 3),
            power_low: false,
            amb_light: Some(40),
            occupancy: OccupancyCode::Likely,
        };
        let mut buf = [0u8; 16];
        let n = encode_core_stats(&mut buf, &stats).unwrap();
        assert_eq!(decode_inbound(&buf[..n]), Ok(NodeEvent::RemoteStats(stats)));
    }

    #[test]
    fn decodes_json_record() {
        let mut buf = *b"{\"@\":\"0a1b\",\"T|C16\":301}\0\0";
        let n = frame_json(&mut buf, 24).unwrap();
        let Ok(NodeEvent::RemoteJson(text)) = decode_inbound(&buf[..n]) else {
            panic!("expected JSON record");
        };
        assert_eq!(text.as_str(), "{\"@\":\"0a1b\",\"T|C16\":301}");
    }

    #[test]
    fn rejects_noise() {
        assert!(decode_inbound(&[0x00, 0x01, 0x02]).is_err());
        assert!(decode_inbound(&[]).is_err());
        assert!(decode_inbound(b"{\"x\":1}").is_err());
    }

    #[test]
    fn cli_window_constants_nest() {
        assert_eq!(CLI_POLL_HUMAN_UNTIL_SCT, 230);
        assert_eq!(CLI_POLL_LATEST_SCT, 205);
        assert_eq!(NEAR_OVERRUN_THRESHOLD, 247);
    }
}
