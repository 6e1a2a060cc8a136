//! Simulated board for host runs.
//!
//! [`SimBoard`] implements every port over a simple room model: the
//! radiator warms the room in proportion to the valve opening, the room
//! loses heat to the outside, and the lights follow the time of day.
//! Sleeping advances the [`SimClock`] one tick at a time.

use std::collections::VecDeque;

use crate::app::commands::NodeCommand;
use crate::app::events::NodeEvent;
use crate::app::ports::{
    CliPort, Clock, EventSink, InboundFrame, NonVolatileStore, PowerPort, RadioPort, SensorPort, UiPort,
    ValveLinkPort,
};
use crate::error::LinkError;

use super::heat_call::{HeatCallOutput, SimPin};
use super::log_sink::LogEventSink;
use super::nvs::NvsAdapter;
use super::time::SimClock;

/// Supply below which the battery counts as low.
pub const SIM_SUPPLY_LOW_MV: u16 = 2_600;
/// Humidity at or above which it counts as high.
pub const SIM_HUMIDITY_HIGH_PC: u8 = 70;

/// Seconds a UI command keeps "recent control use" set.
const RECENT_UI_S: u32 = 180;
const VERY_RECENT_UI_S: u32 = 60;

/// Heat balance of the simulated room, in degrees C.
#[derive(Debug, Clone)]
pub struct RoomModel {
    pub room_c: f32,
    pub outside_c: f32,
    /// Warming per second with the valve fully open.
    pub gain_c_per_s: f32,
    /// Fraction of the inside/outside difference lost per second.
    pub loss_per_s: f32,
    pub humidity_pc: u8,
    /// Hours (inclusive) during which the lights are on.
    pub lights_on_h: (u8, u8),
}

impl Default for RoomModel {
    fn default() -> Self {
        Self {
            room_c: 16.0,
            outside_c: 5.0,
            gain_c_per_s: 0.004,
            loss_per_s: 0.000_2,
            humidity_pc: 55,
            lights_on_h: (7, 22),
        }
    }
}

impl RoomModel {
    fn step(&mut self, seconds: u32, valve_pc: u8) {
        for _ in 0..seconds {
            let heat = self.gain_c_per_s * f32::from(valve_pc) / 100.0;
            let loss = (self.room_c - self.outside_c) * self.loss_per_s;
            self.room_c += heat - loss;
        }
    }

    fn light_at(&self, hh: u8) -> u8 {
        let (on, off) = self.lights_on_h;
        if (on..=off).contains(&hh) { 120 } else { 5 }
    }
}

pub struct SimBoard {
    pub nvs: NvsAdapter,
    pub clock: SimClock,
    pub room: RoomModel,
    pub sink: LogEventSink,
    pub heat_call: HeatCallOutput<SimPin>,
    /// Every event emitted, oldest first.
    pub events: Vec<NodeEvent>,
    /// Every frame transmitted, oldest first.
    pub sent: Vec<Vec<u8>>,
    pub inbound: VecDeque<InboundFrame>,
    pub calls_heard: VecDeque<u16>,
    pub ui_commands: VecDeque<NodeCommand>,
    pub cli_commands: VecDeque<NodeCommand>,
    pub supply_mv_now: u16,
    pub mains: bool,
    pub pot_now: u8,
    pub link_enabled: bool,
    pub house_codes: (u8, u8),
    pub fail_tx: bool,
    /// Position last sent to the valve head.
    pub valve_pc: u8,

    temp_c16: i16,
    amb_light: u8,
    humidity_pc: u8,
    supply_mv: u16,
    temp_pot: u8,
    synced: bool,
    eavesdropping: bool,
    inbound_overruns: u16,
    uptime_s: u32,
    ui_used_at: Option<u32>,
    cycle: u8,
}

impl SimBoard {
    pub fn new(tick_seconds: u8) -> Self {
        Self {
            nvs: NvsAdapter::new(),
            clock: SimClock::new(tick_seconds),
            room: RoomModel::default(),
            sink: LogEventSink::new(),
            heat_call: HeatCallOutput::new(SimPin::default()),
            events: Vec::new(),
            sent: Vec::new(),
            inbound: VecDeque::new(),
            calls_heard: VecDeque::new(),
            ui_commands: VecDeque::new(),
            cli_commands: VecDeque::new(),
            supply_mv_now: 3_000,
            mains: false,
            pot_now: 128,
            link_enabled: false,
            house_codes: (0x12, 0x34),
            fail_tx: false,
            valve_pc: 0,
            temp_c16: 0,
            amb_light: 0,
            humidity_pc: 0,
            supply_mv: 0,
            temp_pot: 0,
            synced: false,
            eavesdropping: false,
            inbound_overruns: 0,
            uptime_s: 0,
            ui_used_at: None,
            cycle: 0,
        }
    }

    /// Queue a frame as if another node had sent it.
    pub fn receive(&mut self, frame: &[u8]) {
        let Ok(frame) = InboundFrame::from_slice(frame) else {
            self.inbound_overruns = self.inbound_overruns.saturating_add(1);
            return;
        };
        if self.inbound.len() >= 4 {
            self.inbound_overruns = self.inbound_overruns.saturating_add(1);
        } else {
            self.inbound.push_back(frame);
        }
    }

    pub fn is_eavesdropping(&self) -> bool {
        self.eavesdropping
    }

    pub fn uptime_s(&self) -> u32 {
        self.uptime_s
    }

    fn advance(&mut self) {
        let before = self.clock.day_seconds();
        self.clock.advance_tick();
        let elapsed = (self.clock.day_seconds() + 86_400 - before) % 86_400;
        self.uptime_s = self.uptime_s.wrapping_add(elapsed);
        self.room.step(elapsed, self.valve_pc);
        self.cycle = self.cycle.wrapping_add(37);
    }

    fn ui_used_within(&self, seconds: u32) -> bool {
        self.ui_used_at
            .is_some_and(|t| self.uptime_s.wrapping_sub(t) < seconds)
    }
}

// ── NonVolatileStore / Clock ──────────────────────────────────

impl NonVolatileStore for SimBoard {
    fn read_byte(&self, addr: u16) -> u8 {
        self.nvs.read_byte(addr)
    }

    fn smart_update_byte(&mut self, addr: u16, value: u8) -> bool {
        self.nvs.smart_update_byte(addr, value)
    }

    fn smart_erase_byte(&mut self, addr: u16) -> bool {
        self.nvs.smart_erase_byte(addr)
    }
}

impl Clock for SimBoard {
    fn seconds_of_minute(&self) -> u8 {
        self.clock.seconds_of_minute()
    }

    fn minutes_of_hour(&self) -> u8 {
        self.clock.minutes_of_hour()
    }

    fn hours_of_day(&self) -> u8 {
        self.clock.hours_of_day()
    }

    fn sub_cycle_time(&self) -> u8 {
        self.clock.sub_cycle_time()
    }
}

// ── SensorPort ────────────────────────────────────────────────

impl SensorPort for SimBoard {
    fn read_temperature_c16(&mut self) -> i16 {
        self.temp_c16 = (self.room.room_c * 16.0).round() as i16;
        self.temp_c16
    }

    fn temperature_c16(&self) -> i16 {
        self.temp_c16
    }

    fn read_ambient_light(&mut self) -> u8 {
        self.amb_light = self.room.light_at(self.clock.hours_of_day());
        self.amb_light
    }

    fn ambient_light(&self) -> u8 {
        self.amb_light
    }

    fn read_humidity_pc(&mut self) -> u8 {
        self.humidity_pc = self.room.humidity_pc.min(100);
        self.humidity_pc
    }

    fn humidity_pc(&self) -> u8 {
        self.humidity_pc
    }

    fn is_humidity_high(&self) -> bool {
        self.humidity_pc >= SIM_HUMIDITY_HIGH_PC
    }

    fn read_supply_mv(&mut self) -> u16 {
        self.supply_mv = self.supply_mv_now;
        self.supply_mv
    }

    fn supply_mv(&self) -> u16 {
        self.supply_mv
    }

    fn is_supply_low(&self) -> bool {
        !self.mains && self.supply_mv != 0 && self.supply_mv < SIM_SUPPLY_LOW_MV
    }

    fn is_mains_powered(&self) -> bool {
        self.mains
    }

    fn read_temp_pot(&mut self) -> u8 {
        self.temp_pot = self.pot_now;
        self.temp_pot
    }

    fn temp_pot(&self) -> u8 {
        self.temp_pot
    }

    fn read_voice(&mut self) -> bool {
        false
    }
}

// ── ValveLinkPort ─────────────────────────────────────────────

impl ValveLinkPort for SimBoard {
    fn is_enabled(&self) -> bool {
        self.link_enabled
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn house_codes(&self) -> (u8, u8) {
        self.house_codes
    }

    fn poll_sync_and_tx_first(&mut self, _double_tx: bool) -> bool {
        // The simulated head syncs on its first slot.
        self.synced = true;
        false
    }

    fn poll_sync_and_tx_next(&mut self, _double_tx: bool) -> bool {
        false
    }

    fn sync_and_tx_reset(&mut self) {
        self.synced = false;
    }

    fn create_valve_set_frame(&mut self, percent_open: u8, _with_stats: bool) {
        self.valve_pc = percent_open.min(100);
    }

    fn call_for_heat_poll(&mut self) -> bool {
        !self.calls_heard.is_empty()
    }

    fn call_for_heat_heard_get_and_clear(&mut self) -> Option<u16> {
        let heard = self.calls_heard.pop_front();
        self.calls_heard.clear();
        heard
    }

    fn last_rx_error_get_and_clear(&mut self) -> u8 {
        0
    }

    fn setup_to_eavesdrop(&mut self, _second0: bool) -> bool {
        let newly = !self.eavesdropping;
        self.eavesdropping = true;
        newly
    }

    fn stop_eavesdrop(&mut self, _second0: bool) {
        self.eavesdropping = false;
    }
}

// ── RadioPort ─────────────────────────────────────────────────

impl RadioPort for SimBoard {
    fn transmit(&mut self, frame: &[u8], _double_tx: bool, _resume_rx: bool) -> Result<(), LinkError> {
        if self.fail_tx {
            return Err(LinkError::TxFailed);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn rssi(&self) -> u8 {
        0
    }

    fn pop_inbound(&mut self) -> Option<InboundFrame> {
        self.inbound.pop_front()
    }

    fn inbound_overruns(&self) -> u16 {
        self.inbound_overruns
    }

    fn standby_and_clear(&mut self) {}
}

// ── UiPort / CliPort ──────────────────────────────────────────

impl UiPort for SimBoard {
    fn poll_ui(&mut self, _second: u8) -> Option<NodeCommand> {
        let cmd = self.ui_commands.pop_front()?;
        self.ui_used_at = Some(self.uptime_s);
        Some(cmd)
    }

    fn recent_control_use(&self) -> bool {
        self.ui_used_within(RECENT_UI_S)
    }

    fn very_recent_control_use(&self) -> bool {
        self.ui_used_within(VERY_RECENT_UI_S)
    }
}

impl CliPort for SimBoard {
    fn is_cli_active(&self) -> bool {
        false
    }

    fn poll_cli(&mut self, _until_sct: u8) -> Option<NodeCommand> {
        self.cli_commands.pop_front()
    }
}

// ── PowerPort / EventSink ─────────────────────────────────────

impl PowerPort for SimBoard {
    fn sleep_until_interrupt(&mut self) {
        self.advance();
    }

    fn nap_and_poll(&mut self) -> bool {
        self.advance();
        !self.calls_heard.is_empty()
    }

    fn minimise_power(&mut self) {}

    fn sleep_low_power_ms(&mut self, _ms: u8) {}

    fn set_heat_call_output(&mut self, on: bool) {
        self.heat_call.set(on);
    }

    fn cycle_count(&self) -> u8 {
        self.cycle
    }
}

impl EventSink for SimBoard {
    fn emit(&mut self, event: &NodeEvent) {
        self.sink.emit(event);
        self.events.push(event.clone());
    }
}
