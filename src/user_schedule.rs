//! Simple daily on-time schedule.
//!
//! Up to [`MAX_SCHEDULES`] start times persist in NV as minutes/6 since
//! midnight (`0xFF` unset). Each is on for an hour, or two with a comfort
//! bias, and the period wraps across midnight.

use log::info;

use crate::app::ports::{NV_ERASED, NonVolatileStore};
use crate::error::{RangeError, Result};

/// NV address of the first schedule slot.
pub const NV_SCHEDULE_START: u16 = 0x28;
/// Number of schedule slots.
pub const MAX_SCHEDULES: u8 = 2;
/// Stored start times are rounded down to this many minutes.
pub const SCHEDULE_GRANULARITY_M: u16 = 6;
/// On period with an eco bias.
pub const ON_PERIOD_M: u16 = 60;
/// On period with a comfort bias.
pub const ON_PERIOD_COMFORT_M: u16 = 120;
/// How far ahead "soon" looks.
pub const PREWARM_M: u16 = 30;

const MINUTES_PER_DAY: u16 = 24 * 60;

fn slot_addr(which: u8) -> Result<u16> {
    if which >= MAX_SCHEDULES {
        return Err(RangeError::ScheduleSlot.into());
    }
    Ok(NV_SCHEDULE_START + u16::from(which))
}

fn on_period_m(comfort: bool) -> u16 {
    if comfort { ON_PERIOD_COMFORT_M } else { ON_PERIOD_M }
}

/// Store a start time for slot `which`, rounded down to the granularity.
pub fn set_simple_schedule(store: &mut impl NonVolatileStore, minutes_since_midnight: u16, which: u8) -> Result<()> {
    let addr = slot_addr(which)?;
    if minutes_since_midnight >= MINUTES_PER_DAY {
        return Err(RangeError::ScheduleTime.into());
    }
    let encoded = (minutes_since_midnight / SCHEDULE_GRANULARITY_M) as u8;
    store.smart_update_byte(addr, encoded);
    info!(
        "schedule[{}]: on at {:02}:{:02}",
        which,
        minutes_since_midnight / 60,
        (u16::from(encoded) * SCHEDULE_GRANULARITY_M) % 60
    );
    Ok(())
}

pub fn clear_simple_schedule(store: &mut impl NonVolatileStore, which: u8) -> Result<()> {
    let addr = slot_addr(which)?;
    store.smart_erase_byte(addr);
    info!("schedule[{}]: cleared", which);
    Ok(())
}

/// Start of slot `which` in minutes since midnight, if set.
pub fn simple_schedule_on(store: &impl NonVolatileStore, which: u8) -> Option<u16> {
    let addr = slot_addr(which).ok()?;
    let raw = store.read_byte(addr);
    let minutes = u16::from(raw) * SCHEDULE_GRANULARITY_M;
    if raw == NV_ERASED || minutes >= MINUTES_PER_DAY {
        return None;
    }
    Some(minutes)
}

/// End of slot `which` in minutes since midnight, if set.
pub fn simple_schedule_off(store: &impl NonVolatileStore, which: u8, comfort: bool) -> Option<u16> {
    simple_schedule_on(store, which).map(|on| (on + on_period_m(comfort)) % MINUTES_PER_DAY)
}

pub fn is_any_simple_schedule_set(store: &impl NonVolatileStore) -> bool {
    (0..MAX_SCHEDULES).any(|w| simple_schedule_on(store, w).is_some())
}

fn any_on_at(store: &impl NonVolatileStore, mm: u16, comfort: bool) -> bool {
    let period = on_period_m(comfort);
    (0..MAX_SCHEDULES).any(|w| match simple_schedule_on(store, w) {
        Some(on) => (mm + MINUTES_PER_DAY - on) % MINUTES_PER_DAY < period,
        None => false,
    })
}

/// Some schedule is in its on period at `mm`.
pub fn is_any_schedule_on_warm_now(store: &impl NonVolatileStore, mm: u16, comfort: bool) -> bool {
    any_on_at(store, mm % MINUTES_PER_DAY, comfort)
}

/// Some schedule will be on [`PREWARM_M`] minutes after `mm`.
pub fn is_any_schedule_on_warm_soon(store: &impl NonVolatileStore, mm: u16, comfort: bool) -> bool {
    any_on_at(store, (mm + PREWARM_M) % MINUTES_PER_DAY, comfort)
}

/// Mode change due at minute `mm`: `Some(true)` at a slot start,
/// `Some(false)` at a slot end, `None` otherwise.
pub fn check_user_schedule(store: &impl NonVolatileStore, mm: u16, comfort: bool) -> Option<bool> {
    let mut change = None;
    for w in 0..MAX_SCHEDULES {
        if simple_schedule_on(store, w) == Some(mm) {
            change = Some(true);
        } else if change.is_none() && simple_schedule_off(store, w, comfort) == Some(mm) {
            change = Some(false);
        }
    }
    change
}
