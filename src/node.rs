//! The node's owned state.
//!
//! One aggregate per node, passed by reference through every scheduler
//! phase. Only the occupancy tracker lives outside it, in a `static`,
//! because interrupt handlers mark activity on it directly.

use log::{info, warn};

use crate::app::events::{NodeEvent, StatusSnapshot};
use crate::app::ports::{NonVolatileStore, Platform, ValveLinkPort};
use crate::config::NodeConfig;
use crate::control::policy::should_be_warmed_at_hour;
use crate::control::targets::TEMP_SCALE_MID;
use crate::control::{ModeState, PolicyInputs, RadiatorEnv, RadiatorValve, TempControl, compute_target_temp};
use crate::error::Result;
use crate::occupancy::OccupancyTracker;
use crate::payload::{CoreStats, OccupancyCode, STATS_MSG_MAX_LEN, StatsRotation, encode_core_stats, frame_json};
use crate::rng::Rng8;
use crate::scheduler::hub::{HubState, min_boiler_on_minutes};
use crate::sensors::{AmbientLight, amb_light_for_stats, supply_cv};
use crate::stats::StatsSet;
use crate::stats::sampler::{StatsReading, StatsSampler};
use crate::stats::store::{in_outlier_quartile, zap_stats};
use crate::user_schedule::{
    PREWARM_M, check_user_schedule, is_any_schedule_on_warm_now, is_any_schedule_on_warm_soon,
    is_any_simple_schedule_set,
};

/// NV address of the overrun counter, stored inverted so erased reads 0.
pub const NV_OVERRUN_COUNTER_INV: u16 = 0x20;
/// NV address of the two-byte node ID.
pub const NV_NODE_ID: u16 = 0x10;
/// Most stats the JSON rotation carries.
pub const JSON_STATS_ITEMS: usize = 8;
/// Stats bytes erased per tick while a zap is running.
pub const ZAP_BYTES_PER_TICK: u16 = 32;

/// Persisted count of tick overruns, saturating at 255.
pub fn overrun_count(store: &impl NonVolatileStore) -> u8 {
    !store.read_byte(NV_OVERRUN_COUNTER_INV)
}

/// Add one to the persisted overrun count. Returns the new total.
pub fn record_overrun(store: &mut impl NonVolatileStore) -> u8 {
    let count = overrun_count(store).saturating_add(1);
    store.smart_update_byte(NV_OVERRUN_COUNTER_INV, !count);
    count
}

pub struct NodeState {
    pub config: NodeConfig,
    pub mode: ModeState,
    pub temps: TempControl,
    pub ambient: AmbientLight,
    pub radiator: RadiatorValve,
    pub sampler: StatsSampler,
    pub rng: Rng8,
    pub rotation: StatsRotation<JSON_STATS_ITEMS>,
    pub hub: HubState,
    occupancy: &'static OccupancyTracker,
    /// Minutes since start, wrapping. Only the low bits matter.
    pub minute_count: u8,
    /// Second of the minute the current tick belongs to.
    pub time_lsd: u8,
    /// Inbound frames that failed their checks.
    pub garbled_frames: u16,
    zap_pending: bool,
}

impl NodeState {
    pub fn new(config: NodeConfig, occupancy: &'static OccupancyTracker) -> Self {
        let mut radiator = RadiatorValve::new(config.max_pc_open);
        radiator.set_glacial(config.glacial);
        Self {
            mode: ModeState::new(config.bake_supported),
            temps: TempControl::new(&config),
            ambient: AmbientLight::new(),
            radiator,
            sampler: StatsSampler::new(),
            rng: Rng8::new(),
            rotation: StatsRotation::new(),
            hub: HubState::new(),
            occupancy,
            minute_count: 0,
            time_lsd: 0,
            garbled_frames: 0,
            zap_pending: false,
            config,
        }
    }

    pub fn occupancy(&self) -> &'static OccupancyTracker {
        self.occupancy
    }

    pub fn tick_seconds(&self) -> u8 {
        self.config.tick_seconds()
    }

    /// This node drives its valve over the valve link.
    pub fn valve_link_active(&self, link: &impl ValveLinkPort) -> bool {
        self.config.local_trv && link.is_enabled()
    }

    /// Listening for remote calls for heat.
    pub fn in_hub_mode(&self, store: &impl NonVolatileStore) -> bool {
        self.config.hub_listen && min_boiler_on_minutes(store) != 0
    }

    /// House codes when driving a valve over the link, else the NV ID.
    pub fn node_id<P: NonVolatileStore + ValveLinkPort>(&self, p: &P) -> [u8; 2] {
        if self.valve_link_active(p) {
            let (hc1, hc2) = p.house_codes();
            [hc1, hc2]
        } else {
            [p.read_byte(NV_NODE_ID), p.read_byte(NV_NODE_ID + 1)]
        }
    }

    pub fn is_valve_really_open<P: NonVolatileStore + ValveLinkPort>(&self, p: &P) -> bool {
        let link_ready = !self.valve_link_active(p) || p.is_synced();
        self.radiator.is_controlled_valve_really_open(p, link_ready)
    }

    /// Run optional work less often: battery low, FROST or long vacant,
    /// unless heat is wanted here or by a remote valve.
    pub fn should_conserve_battery<P: Platform>(&self, p: &P) -> bool {
        let long_vacant = self.config.occupancy_support && self.occupancy.long_vacant();
        (p.is_supply_low() || !self.mode.in_warm_mode() || long_vacant)
            && !self.hub.boiler_on()
            && !self.is_valve_really_open(p)
            && !self.radiator.is_calling_for_heat()
    }

    // ── Target and valve ──────────────────────────────────────

    /// Everything the target policy needs, read from the platform caches.
    pub fn policy_inputs<P: Platform>(&self, p: &P) -> PolicyInputs {
        let pot = p.temp_pot();
        let humidity_high = self.config.humidity_sensor && p.is_humidity_high();
        let warm_target_c = self.temps.warm_target_c(p, pot);
        let frost_target_c = self.temps.frost_target_c(p, pot, humidity_high);
        let comfort = warm_target_c > TEMP_SCALE_MID;
        let mm = p.minutes_since_midnight();
        let hh = p.hours_of_day();
        let occ = self.config.occupancy_support;
        let tracker = self.occupancy;

        let mut schedule_on_soon = is_any_schedule_on_warm_soon(p, mm, comfort);
        // With a schedule set, history can also ask for warmth next hour.
        if !schedule_on_soon
            && self.config.anticipation
            && is_any_simple_schedule_set(p)
            && u16::from(p.minutes_of_hour()) >= 60 - PREWARM_M
        {
            schedule_on_soon = should_be_warmed_at_hour(p, (hh + 1) % 24, warm_target_c, occ);
        }

        PolicyInputs {
            warm_mode: self.mode.in_warm_mode(),
            bake_mode: self.mode.in_bake_mode(),
            warm_target_c,
            frost_target_c,
            long_vacant: occ && tracker.long_vacant(),
            long_long_vacant: occ && tracker.long_long_vacant(),
            likely_occupied: occ && tracker.is_likely_occupied(),
            room_lit: self.ambient.is_room_lit(),
            dark_minutes: self.ambient.dark_minutes(),
            schedule_on_now: is_any_schedule_on_warm_now(p, mm, comfort),
            schedule_on_soon,
            recent_ui_use: p.recent_control_use(),
            occupancy_bottom_quartile: occ && in_outlier_quartile(p, false, StatsSet::OccPcByHourSmoothed, hh),
            occupancy_top_quartile: occ && in_outlier_quartile(p, true, StatsSet::OccPcByHourSmoothed, hh),
        }
    }

    /// Recompute the target and the call for heat without moving the valve.
    pub fn compute_target_temperature<P: Platform>(&mut self, p: &P) {
        let inputs = self.policy_inputs(p);
        let env = RadiatorEnv {
            target_temp_c: compute_target_temp(&inputs),
            in_warm_mode: inputs.warm_mode,
            in_bake_mode: inputs.bake_mode,
            has_eco_bias: inputs.has_eco_bias(),
            room_dark: self.ambient.is_room_dark(),
            long_vacant: inputs.long_vacant,
            temp_c16: p.temperature_c16(),
        };
        self.radiator.compute_target_temperature(p, &env);
    }

    /// Once-a-minute recompute: BAKE bookkeeping, fresh target, then one
    /// controller step. Returns `true` if the valve moved.
    pub fn compute_call_for_heat<P: Platform>(&mut self, p: &mut P) -> bool {
        self.mode.tick_bake(self.radiator.is_calling_for_heat());
        self.compute_target_temperature(p);
        let from_pc = self.radiator.valve_pc();
        let moved = self.radiator.tick();
        if moved {
            p.emit(&NodeEvent::ValveMoved {
                from_pc,
                to_pc: self.radiator.valve_pc(),
                target_c: self.radiator.target_temp_c(),
            });
        }
        moved
    }

    /// Switch mode at a schedule slot edge, if one falls on this minute.
    pub fn apply_user_schedule<P: Platform>(&mut self, p: &P) {
        let comfort = !self.temps.has_eco_bias(p, p.temp_pot());
        if let Some(warm) = check_user_schedule(p, p.minutes_since_midnight(), comfort) {
            info!("schedule: switching to {}", if warm { "WARM" } else { "FROST" });
            self.mode.set_warm_mode(warm);
        }
    }

    /// Stir sensor and timing noise into the generator.
    pub fn reseed<P: Platform>(&mut self, p: &P) {
        self.rng.seed(
            self.minute_count ^ p.cycle_count() ^ (p.supply_mv() as u8),
            p.sub_cycle_time() ^ p.ambient_light(),
            p.temperature_c16() as u8,
        );
    }

    // ── Stats ─────────────────────────────────────────────────

    pub fn stats_reading<P: Platform>(&self, p: &P) -> StatsReading {
        StatsReading {
            warm_mode: self.mode.in_warm_mode(),
            ambient_light: p.ambient_light(),
            temp_c16: p.temperature_c16(),
            occupancy_pc: self.config.occupancy_support.then(|| self.occupancy.get()),
            humidity_pc: self.config.humidity_sensor.then(|| p.humidity_pc()),
        }
    }

    pub fn sample_stats<P: Platform>(&mut self, p: &mut P, full_sample: bool) {
        let reading = self.stats_reading(p);
        let hh = p.hours_of_day();
        self.sampler.sample_stats(full_sample, hh, &reading, p, &mut self.rng);
    }

    /// Request a full stats erase, spread over the following ticks.
    pub fn start_zap(&mut self) {
        info!("stats: zap requested");
        self.zap_pending = true;
    }

    pub fn zap_pending(&self) -> bool {
        self.zap_pending
    }

    /// Erase the next few stats bytes if a zap is running.
    pub fn continue_zap(&mut self, store: &mut impl NonVolatileStore) {
        if self.zap_pending && zap_stats(store, ZAP_BYTES_PER_TICK) {
            self.zap_pending = false;
            info!("stats: zap complete");
        }
    }

    pub fn populate_core_stats<P: Platform>(&self, p: &P) -> CoreStats {
        let occupancy = if self.config.occupancy_support && self.config.disclose_occupancy {
            OccupancyCode::from_bits(self.occupancy.two_bit_value())
        } else {
            OccupancyCode::Undisclosed
        };
        CoreStats {
            id: Some(self.node_id(p)),
            temp_c16: Some(p.temperature_c16()),
            power_low: p.is_supply_low(),
            amb_light: Some(amb_light_for_stats(p.ambient_light())),
            occupancy,
        }
    }

    /// Refresh the JSON rotation from the current readings. A valve node
    /// reports its valve, a sensor node its light level.
    pub fn update_json_stats<P: Platform>(&mut self, p: &P) {
        let r = &mut self.rotation;
        r.put("T|C16", p.temperature_c16());
        if self.config.humidity_sensor {
            r.put("H|%", i16::from(p.humidity_pc()));
        }
        if self.config.occupancy_support && self.config.disclose_occupancy {
            r.put("O", i16::from(self.occupancy.two_bit_value()));
            r.put("vac|h", i16::from(self.occupancy.vacancy_h()));
        }
        if p.is_mains_powered() {
            r.remove("B|cV");
        } else {
            r.put("B|cV", supply_cv(p.supply_mv()));
        }
        if self.config.local_trv {
            r.put("v|%", i16::from(self.radiator.valve_pc()));
            r.put("tT|C", i16::from(self.radiator.target_temp_c()));
            let moved = self.radiator.cumulative_movement_pc().min(i16::MAX as u16);
            r.put("vC|%", moved as i16);
        } else {
            r.put("L", i16::from(p.ambient_light()));
        }
    }

    /// Build and send one stats frame, binary or JSON. A frame that cannot
    /// be encoded is abandoned whole.
    pub fn transmit_stats<P: Platform>(
        &mut self,
        p: &mut P,
        binary: bool,
        double_tx: bool,
        resume_rx: bool,
    ) -> Result<usize> {
        let mut buf = [0u8; STATS_MSG_MAX_LEN];
        let encoded = if binary {
            let stats = self.populate_core_stats(p);
            encode_core_stats(&mut buf, &stats)
        } else {
            self.update_json_stats(p);
            let id = self.node_id(p);
            self.rotation
                .write_json(&mut buf, Some(id), true)
                .and_then(|n| frame_json(&mut buf, n))
        };
        let len = match encoded {
            Ok(len) => len,
            Err(e) => {
                warn!("stats: TX abandoned: {}", e);
                p.emit(&NodeEvent::StatsAbandoned(e));
                return Err(e.into());
            }
        };
        if let Err(e) = p.transmit(&buf[..len], double_tx, resume_rx) {
            warn!("stats: TX failed: {}", e);
            p.emit(&NodeEvent::LinkFailed(e));
            return Err(e.into());
        }
        p.emit(&NodeEvent::StatsSent { binary, len });
        Ok(len)
    }

    pub fn status<P: Platform>(&self, p: &P) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.mode.mode(),
            target_c: self.radiator.target_temp_c(),
            temp_c16: p.temperature_c16(),
            valve_pc: self.radiator.valve_pc(),
            calling_for_heat: self.radiator.is_calling_for_heat(),
            occupancy_pc: self.occupancy.get(),
            vacancy_h: self.occupancy.vacancy_h(),
            amb_light: p.ambient_light(),
            supply_mv: p.supply_mv(),
            boiler_on: self.hub.boiler_on(),
            overruns: overrun_count(p),
        }
    }
}
