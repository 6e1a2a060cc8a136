//! Mock board for integration tests.
//!
//! Implements every port and records each call that reaches hardware, so
//! tests can assert on the full call history. Sleeping advances the clock
//! by one tick; nothing else moves it unless a test asks.

use std::collections::VecDeque;

use radvalve::adapters::nvs::NvsAdapter;
use radvalve::app::commands::NodeCommand;
use radvalve::app::events::NodeEvent;
use radvalve::app::ports::{
    CliPort, Clock, EventSink, InboundFrame, NonVolatileStore, PowerPort, RadioPort, SensorPort, UiPort,
    ValveLinkPort,
};
use radvalve::error::LinkError;

// ── Board call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BoardCall {
    ReadTemperature,
    ReadAmbientLight,
    ReadHumidity,
    ReadSupply,
    ReadTempPot,
    ReadVoice,
    TxFirst { double_tx: bool },
    TxNext { double_tx: bool },
    SyncReset,
    ValveFrame { percent_open: u8, with_stats: bool },
    Transmit { len: usize, double_tx: bool, resume_rx: bool },
    Eavesdrop,
    StopEavesdrop,
    HeatCall(bool),
    Sleep,
    Nap,
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub nvs: NvsAdapter,
    /// Seconds since midnight.
    pub day_seconds: u32,
    pub tick_seconds: u32,
    pub sct: u8,
    pub calls: Vec<BoardCall>,
    pub events: Vec<NodeEvent>,
    pub sent: Vec<Vec<u8>>,
    pub inbound: VecDeque<InboundFrame>,
    pub heard: Option<u16>,
    pub ui: VecDeque<NodeCommand>,
    pub cli: VecDeque<NodeCommand>,
    /// Seconds the clock jumps during the next UI poll.
    pub jump_in_ui: u32,

    pub temp_c16: i16,
    pub amb_light: u8,
    pub humidity_pc: u8,
    pub supply_mv: u16,
    pub supply_low: bool,
    pub temp_pot: u8,
    pub link_enabled: bool,
    pub synced: bool,
    pub tx_fails: bool,
    pub want_more_tx: bool,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            nvs: NvsAdapter::new(),
            day_seconds: 0,
            tick_seconds: 1,
            sct: 0,
            calls: Vec::new(),
            events: Vec::new(),
            sent: Vec::new(),
            inbound: VecDeque::new(),
            heard: None,
            ui: VecDeque::new(),
            cli: VecDeque::new(),
            jump_in_ui: 0,
            temp_c16: 18 * 16,
            amb_light: 200,
            humidity_pc: 50,
            supply_mv: 3_000,
            supply_low: false,
            temp_pot: 128,
            link_enabled: false,
            synced: true,
            tx_fails: false,
            want_more_tx: false,
        }
    }

    pub fn at(mut self, hh: u32, mm: u32, ss: u32) -> Self {
        self.day_seconds = hh * 3600 + mm * 60 + ss;
        self
    }

    pub fn count(&self, pred: impl Fn(&BoardCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn events_matching(&self, pred: impl Fn(&NodeEvent) -> bool) -> Vec<&NodeEvent> {
        self.events.iter().filter(|e| pred(e)).collect()
    }

    /// Last level written to the heat call output.
    pub fn heat_call(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match c {
            BoardCall::HeatCall(on) => Some(*on),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.events.clear();
        self.sent.clear();
    }

    fn advance(&mut self, seconds: u32) {
        self.day_seconds = (self.day_seconds + seconds) % 86_400;
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl NonVolatileStore for MockBoard {
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

impl Clock for MockBoard {
    fn seconds_of_minute(&self) -> u8 {
        (self.day_seconds % 60) as u8
    }

    fn minutes_of_hour(&self) -> u8 {
        (self.day_seconds / 60 % 60) as u8
    }

    fn hours_of_day(&self) -> u8 {
        (self.day_seconds / 3600) as u8
    }

    fn sub_cycle_time(&self) -> u8 {
        self.sct
    }
}

impl SensorPort for MockBoard {
    fn read_temperature_c16(&mut self) -> i16 {
        self.calls.push(BoardCall::ReadTemperature);
        self.temp_c16
    }

    fn temperature_c16(&self) -> i16 {
        self.temp_c16
    }

    fn read_ambient_light(&mut self) -> u8 {
        self.calls.push(BoardCall::ReadAmbientLight);
        self.amb_light
    }

    fn ambient_light(&self) -> u8 {
        self.amb_light
    }

    fn read_humidity_pc(&mut self) -> u8 {
        self.calls.push(BoardCall::ReadHumidity);
        self.humidity_pc
    }

    fn humidity_pc(&self) -> u8 {
        self.humidity_pc
    }

    fn is_humidity_high(&self) -> bool {
        self.humidity_pc >= 70
    }

    fn read_supply_mv(&mut self) -> u16 {
        self.calls.push(BoardCall::ReadSupply);
        self.supply_mv
    }

    fn supply_mv(&self) -> u16 {
        self.supply_mv
    }

    fn is_supply_low(&self) -> bool {
        self.supply_low
    }

    fn is_mains_powered(&self) -> bool {
        false
    }

    fn read_temp_pot(&mut self) -> u8 {
        self.calls.push(BoardCall::ReadTempPot);
        self.temp_pot
    }

    fn temp_pot(&self) -> u8 {
        self.temp_pot
    }

    fn read_voice(&mut self) -> bool {
        self.calls.push(BoardCall::ReadVoice);
        false
    }
}

impl ValveLinkPort for MockBoard {
    fn is_enabled(&self) -> bool {
        self.link_enabled
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn house_codes(&self) -> (u8, u8) {
        (0x0a, 0x0b)
    }

    fn poll_sync_and_tx_first(&mut self, double_tx: bool) -> bool {
        self.calls.push(BoardCall::TxFirst { double_tx });
        self.want_more_tx
    }

    fn poll_sync_and_tx_next(&mut self, double_tx: bool) -> bool {
        self.calls.push(BoardCall::TxNext { double_tx });
        self.want_more_tx
    }

    fn sync_and_tx_reset(&mut self) {
        self.calls.push(BoardCall::SyncReset);
    }

    fn create_valve_set_frame(&mut self, percent_open: u8, with_stats: bool) {
        self.calls.push(BoardCall::ValveFrame { percent_open, with_stats });
    }

    fn call_for_heat_poll(&mut self) -> bool {
        self.heard.is_some()
    }

    fn call_for_heat_heard_get_and_clear(&mut self) -> Option<u16> {
        self.heard.take()
    }

    fn last_rx_error_get_and_clear(&mut self) -> u8 {
        0
    }

    fn setup_to_eavesdrop(&mut self, _second0: bool) -> bool {
        self.calls.push(BoardCall::Eavesdrop);
        true
    }

    fn stop_eavesdrop(&mut self, _second0: bool) {
        self.calls.push(BoardCall::StopEavesdrop);
    }
}

impl RadioPort for MockBoard {
    fn transmit(&mut self, frame: &[u8], double_tx: bool, resume_rx: bool) -> Result<(), LinkError> {
        self.calls.push(BoardCall::Transmit {
            len: frame.len(),
            double_tx,
            resume_rx,
        });
        if self.tx_fails {
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
        0
    }

    fn standby_and_clear(&mut self) {}
}

impl UiPort for MockBoard {
    fn poll_ui(&mut self, _second: u8) -> Option<NodeCommand> {
        if self.jump_in_ui > 0 {
            let jump = std::mem::take(&mut self.jump_in_ui);
            self.advance(jump);
        }
        self.ui.pop_front()
    }

    fn recent_control_use(&self) -> bool {
        false
    }

    fn very_recent_control_use(&self) -> bool {
        false
    }
}

impl CliPort for MockBoard {
    fn is_cli_active(&self) -> bool {
        false
    }

    fn poll_cli(&mut self, _until_sct: u8) -> Option<NodeCommand> {
        self.cli.pop_front()
    }
}

impl PowerPort for MockBoard {
    fn sleep_until_interrupt(&mut self) {
        self.calls.push(BoardCall::Sleep);
        self.advance(self.tick_seconds);
    }

    fn nap_and_poll(&mut self) -> bool {
        self.calls.push(BoardCall::Nap);
        self.advance(self.tick_seconds);
        false
    }

    fn minimise_power(&mut self) {}

    fn sleep_low_power_ms(&mut self, _ms: u8) {}

    fn set_heat_call_output(&mut self, on: bool) {
        if self.heat_call() != Some(on) {
            self.calls.push(BoardCall::HeatCall(on));
        }
    }

    fn cycle_count(&self) -> u8 {
        0x5a
    }
}

impl EventSink for MockBoard {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}
