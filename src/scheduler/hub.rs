//! Boiler hub.
//!
//! A hub listens for remote valves calling for heat and holds the boiler
//! on for a minimum run after each call. Listening costs power and warms
//! the case (which skews the local temperature reading), so the receiver
//! is only kept on when a call could plausibly be missed.

use log::info;

use crate::app::ports::NonVolatileStore;

/// NV address of the minimum boiler-on time, stored inverted so an
/// erased cell reads as 0 (hub disabled).
pub const NV_MIN_BOILER_ON_M_INV: u16 = 0x23;

/// Longest gap between valve-link transmissions, in half seconds.
pub const MAX_VALVE_TX_CYCLE_HS: u16 = 230;

/// Quiet minutes left on the boiler run below which listening resumes.
pub const RX_REDUCE_MIN_M: u16 = 20;

/// Quiet minutes after which a local-valve hub also skips the minute
/// before the sensor minute.
pub const RX_REDUCE_MAX_M: u8 = 240;

/// Minimum boiler run per call for heat, in minutes. 0 disables the hub.
pub fn min_boiler_on_minutes(store: &impl NonVolatileStore) -> u8 {
    !store.read_byte(NV_MIN_BOILER_ON_M_INV)
}

/// Persist the minimum boiler run. 0 erases the cell, disabling the hub.
pub fn set_min_boiler_on_minutes(store: &mut impl NonVolatileStore, minutes: u8) {
    if minutes == 0 {
        store.smart_erase_byte(NV_MIN_BOILER_ON_M_INV);
    } else {
        store.smart_update_byte(NV_MIN_BOILER_ON_M_INV, !minutes);
    }
    info!("hub: min boiler on {} min", minutes);
}

/// Boiler state change caused by one [`HubState::record`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoilerChange {
    On,
    Off,
}

/// What the eavesdrop decision looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct EavesdropInputs {
    /// This node also regulates a radiator of its own.
    pub local_valve: bool,
    pub battery_low: bool,
    /// A call for heat was heard this tick.
    pub heard: bool,
    /// First minute of each group of four, kept quiet for sensor reads.
    pub minute0_from_4: bool,
    pub minute_count: u8,
    pub tick_seconds: u8,
}

#[derive(Debug, Clone, Default)]
pub struct HubState {
    boiler_countdown_ticks: u16,
    boiler_no_call_m: u8,
    eavesdropping: bool,
    last_dropped: u16,
}

impl HubState {
    pub const fn new() -> Self {
        Self {
            boiler_countdown_ticks: 0,
            boiler_no_call_m: 0,
            eavesdropping: false,
            last_dropped: 0,
        }
    }

    /// Per-tick bookkeeping. A heard call restarts the boiler run; otherwise
    /// the run counts down, and once it has ended whole quiet minutes are
    /// counted on `second0`.
    pub fn record(&mut self, heard: bool, min_on_m: u8, tick_seconds: u8, second0: bool) -> Option<BoilerChange> {
        if heard {
            let was_off = self.boiler_countdown_ticks == 0;
            self.boiler_countdown_ticks = u16::from(min_on_m) * u16::from(60 / tick_seconds.max(1));
            self.boiler_no_call_m = 0;
            return (was_off && self.boiler_countdown_ticks != 0).then_some(BoilerChange::On);
        }
        if self.boiler_countdown_ticks > 0 {
            self.boiler_countdown_ticks -= 1;
            return (self.boiler_countdown_ticks == 0).then_some(BoilerChange::Off);
        }
        if second0 {
            self.boiler_no_call_m = self.boiler_no_call_m.saturating_add(1);
        }
        None
    }

    /// The boiler should be running for remote valves.
    pub fn boiler_on(&self) -> bool {
        self.boiler_countdown_ticks > 0
    }

    pub fn boiler_countdown_ticks(&self) -> u16 {
        self.boiler_countdown_ticks
    }

    /// Minutes since the boiler run from the last remote call ended.
    pub fn boiler_no_call_m(&self) -> u8 {
        self.boiler_no_call_m
    }

    pub fn is_eavesdropping(&self) -> bool {
        self.eavesdropping
    }

    pub fn set_eavesdropping(&mut self, on: bool) {
        self.eavesdropping = on;
    }

    /// Track the inbound-queue overrun count. Returns the new total if it
    /// moved since the last call.
    pub fn dropped_changed(&mut self, dropped: u16) -> Option<u16> {
        if dropped == self.last_dropped {
            return None;
        }
        self.last_dropped = dropped;
        Some(dropped)
    }

    /// Whether the receiver should be on for the coming tick.
    ///
    /// A hub without a valve of its own listens all the time unless its
    /// battery is low. Otherwise it always covers the last valve-link TX
    /// cycle of a boiler run, and listens eagerly near the end of a run
    /// except just after a call, in the quiet sensor minute and (once very
    /// quiet) the minute before it.
    pub fn needs_to_eavesdrop(&self, i: &EavesdropInputs) -> bool {
        let tick_s = u16::from(i.tick_seconds.max(1));
        let countdown = self.boiler_countdown_ticks;
        if !i.local_valve && !i.battery_low {
            return true;
        }
        if countdown != 0 && countdown <= (MAX_VALVE_TX_CYCLE_HS + 1) / (2 * tick_s) {
            return true;
        }
        if !i.heard && !i.minute0_from_4 && countdown <= RX_REDUCE_MIN_M * (60 / tick_s) {
            if i.local_valve {
                return self.boiler_no_call_m <= RX_REDUCE_MAX_M || i.minute_count & 3 != 3;
            }
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;
    use crate::app::ports::NV_ERASED;

    fn local(countdown_heard: bool) -> EavesdropInputs {
        EavesdropInputs {
            local_valve: true,
            heard: countdown_heard,
            minute_count: 1,
            tick_seconds: 1,
            ..EavesdropInputs::default()
        }
    }

    #[test]
    fn min_boiler_on_is_stored_inverted() {
        let mut store = NvsAdapter::new();
        assert_eq!(min_boiler_on_minutes(&store), 0);
        set_min_boiler_on_minutes(&mut store, 4);
        assert_eq!(store.read_byte(NV_MIN_BOILER_ON_M_INV), !4);
        assert_eq!(min_boiler_on_minutes(&store), 4);
        set_min_boiler_on_minutes(&mut store, 0);
        assert_eq!(store.read_byte(NV_MIN_BOILER_ON_M_INV), NV_ERASED);
    }

    #[test]
    fn heard_call_loads_countdown_in_ticks() {
        let mut hub = HubState::new();
        assert_eq!(hub.record(true, 5, 2, false), Some(BoilerChange::On));
        assert_eq!(hub.boiler_countdown_ticks(), 150);
        assert!(hub.boiler_on());
        // A repeat call only restarts the run.
        assert_eq!(hub.record(true, 5, 2, false), None);
    }

    #[test]
    fn countdown_turns_boiler_off_then_counts_quiet_minutes() {
        let mut hub = HubState::new();
        hub.record(true, 1, 1, false);
        for _ in 0..59 {
            assert_eq!(hub.record(false, 1, 1, false), None);
        }
        assert_eq!(hub.record(false, 1, 1, true), Some(BoilerChange::Off));
        assert!(!hub.boiler_on());
        assert_eq!(hub.boiler_no_call_m(), 0);
        hub.record(false, 1, 1, false);
        hub.record(false, 1, 1, true);
        assert_eq!(hub.boiler_no_call_m(), 1);
    }

    #[test]
    fn pure_hub_always_listens_unless_battery_low() {
        let hub = HubState::new();
        let mut i = EavesdropInputs {
            tick_seconds: 1,
            minute0_from_4: true,
            heard: true,
            ..EavesdropInputs::default()
        };
        assert!(hub.needs_to_eavesdrop(&i));
        i.battery_low = true;
        assert!(!hub.needs_to_eavesdrop(&i));
    }

    #[test]
    fn local_valve_hub_covers_final_tx_cycle() {
        let mut hub = HubState::new();
        hub.record(true, 2, 1, false);
        let mut i = local(true);
        assert!(!hub.needs_to_eavesdrop(&i), "just heard, long run left");
        i.heard = false;
        while hub.boiler_countdown_ticks() > 115 {
            hub.record(false, 2, 1, false);
        }
        i.minute0_from_4 = true;
        assert!(hub.needs_to_eavesdrop(&i));
    }

    #[test]
    fn local_valve_hub_skips_quiet_sensor_minute() {
        let hub = HubState::new();
        let mut i = local(false);
        assert!(hub.needs_to_eavesdrop(&i));
        i.minute0_from_4 = true;
        assert!(!hub.needs_to_eavesdrop(&i));
    }

    #[test]
    fn very_quiet_local_hub_skips_pre_sensor_minute() {
        let mut hub = HubState::new();
        for _ in 0..=RX_REDUCE_MAX_M {
            hub.record(false, 0, 1, true);
        }
        let mut i = local(false);
        i.minute_count = 3;
        assert!(!hub.needs_to_eavesdrop(&i));
        i.minute_count = 2;
        assert!(hub.needs_to_eavesdrop(&i));
    }

    #[test]
    fn dropped_count_reported_once_per_change() {
        let mut hub = HubState::new();
        assert_eq!(hub.dropped_changed(0), None);
        assert_eq!(hub.dropped_changed(3), Some(3));
        assert_eq!(hub.dropped_changed(3), None);
    }
}
