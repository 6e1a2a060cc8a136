//! Once-a-minute work, keyed by the second of the minute.
//!
//! Every slot is an even second so a two-second tick still reaches each
//! one. Sensors are read late in the minute, just before the valve is
//! recomputed at second 56, so the valve always works from fresh values.

use log::debug;

use crate::app::ports::{Platform, RandomSource};

use super::context::TickContext;

pub const SECOND_MINUTE_START: u8 = 0;
pub const SECOND_RESEED: u8 = 2;
pub const SECOND_SUPPLY: u8 = 4;
pub const SECOND_STATS_TX: u8 = 10;
pub const SECOND_VOICE: u8 = 46;
pub const SECOND_TEMP_POT: u8 = 48;
pub const SECOND_HUMIDITY: u8 = 50;
pub const SECOND_AMBIENT: u8 = 52;
pub const SECOND_TEMPERATURE: u8 = 54;
pub const SECOND_VALVE: u8 = 56;
pub const SECOND_SAMPLE_STATS: u8 = 58;

/// Run the task due at `node.time_lsd`, if any.
pub fn run_minute_task<P: Platform>(ctx: &mut TickContext<'_, P>) {
    if ctx.node.time_lsd == SECOND_STATS_TX {
        maybe_send_stats(ctx);
        return;
    }
    let run_all = ctx.flags.run_all;
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    let occ = node.config.occupancy_support;

    match node.time_lsd {
        SECOND_MINUTE_START => {
            node.minute_count = node.minute_count.wrapping_add(1);
            node.apply_user_schedule(p);
        }
        SECOND_RESEED if run_all => node.reseed(p),
        SECOND_SUPPLY if run_all => {
            let mv = p.read_supply_mv();
            debug!("supply: {} mV", mv);
        }
        SECOND_VOICE if node.config.voice_sensor => {
            if p.read_voice() && occ {
                node.occupancy().mark_as_possibly_occupied();
            }
        }
        SECOND_TEMP_POT if node.config.temp_pot => {
            p.read_temp_pot();
        }
        SECOND_HUMIDITY if node.config.humidity_sensor && run_all => {
            p.read_humidity_pc();
        }
        SECOND_AMBIENT => {
            let level = p.read_ambient_light();
            if node.ambient.update(level) && occ {
                node.occupancy().mark_as_possibly_occupied();
            }
        }
        SECOND_TEMPERATURE => {
            p.read_temperature_c16();
        }
        SECOND_VALVE => {
            if occ {
                node.occupancy().read();
            }
            let moved = node.compute_call_for_heat(p);
            let with_stats = ctx.flags.minute1_from_4() && node.config.stats_tx;
            if (moved || with_stats) && node.valve_link_active(p) {
                p.create_valve_set_frame(node.radiator.valve_pc(), with_stats);
            }
            if run_all {
                ctx.flags.show_status = true;
            }
        }
        SECOND_SAMPLE_STATS if ctx.flags.minute0_from_4() => {
            let mm = p.minutes_of_hour();
            if (26..=29).contains(&mm) && !ctx.flags.battery_low {
                node.sample_stats(p, false);
            } else if mm >= 56 {
                node.sample_stats(p, true);
            }
        }
        _ => {}
    }
}

/// Stats go out in the minute after the sensor minute, and otherwise at
/// random when the battery allows. A node whose valve link is busy this
/// tick leaves the radio alone.
fn maybe_send_stats<P: Platform>(ctx: &mut TickContext<'_, P>) {
    let flags = ctx.flags;
    let p = &mut *ctx.platform;
    let node = &mut *ctx.node;
    if !node.config.stats_tx || (node.valve_link_active(p) && flags.use_extra_tx_slots) {
        return;
    }
    let minute1 = flags.minute1_from_4();
    if !minute1 && (flags.battery_low || node.rng.next_u8() & 0x24 != 0) {
        return;
    }

    if flags.hub_mode {
        p.call_for_heat_poll();
    }
    // Jitter so nodes sharing a clock do not collide.
    p.sleep_low_power_ms(1 + (node.rng.next_u8() & 0x7f));

    let binary = !node.config.json_stats || (!node.valve_link_active(p) && node.rng.next_bool());
    node.update_json_stats(p);
    let double_tx = minute1 && !flags.battery_low && !flags.hub_mode && node.rotation.changed_count() > 0;
    // Failures are logged and reported by the sender.
    let _ = node.transmit_stats(p, binary, double_tx, flags.hub_mode);
}
