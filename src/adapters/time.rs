//! Clock adapters.
//!
//! - [`SimClock`] is a settable wall clock for the host simulator and
//!   tests. It only moves when told to.
//! - [`RtcClock`] (`target_os = "espidf"`) reads local time from the
//!   ESP-IDF system clock and the high-resolution timer.

use crate::app::ports::Clock;

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Settable wall clock. Time is seconds since local midnight plus a
/// 0..=255 fraction of the current tick.
#[derive(Debug, Clone)]
pub struct SimClock {
    day_seconds: u32,
    sub_cycle: u8,
    tick_seconds: u8,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SimClock {
    /// Midnight, at the start of a tick of `tick_seconds`.
    pub fn new(tick_seconds: u8) -> Self {
        Self {
            day_seconds: 0,
            sub_cycle: 0,
            tick_seconds: tick_seconds.max(1),
        }
    }

    /// Jump to `hh:mm:ss`, start of tick.
    pub fn set_time(&mut self, hh: u8, mm: u8, ss: u8) {
        self.day_seconds = (u32::from(hh) * 3600 + u32::from(mm) * 60 + u32::from(ss)) % SECONDS_PER_DAY;
        self.align();
        self.sub_cycle = 0;
    }

    /// Move to the start of the next tick.
    pub fn advance_tick(&mut self) {
        self.advance_seconds(u32::from(self.tick_seconds));
    }

    /// Move forward whole seconds, landing at the start of a tick.
    pub fn advance_seconds(&mut self, seconds: u32) {
        self.day_seconds = (self.day_seconds + seconds) % SECONDS_PER_DAY;
        self.align();
        self.sub_cycle = 0;
    }

    /// Use up part of the current tick. Saturates at the end of the tick.
    pub fn spend(&mut self, fraction: u8) {
        self.sub_cycle = self.sub_cycle.saturating_add(fraction);
    }

    pub fn set_sub_cycle(&mut self, sct: u8) {
        self.sub_cycle = sct;
    }

    pub fn day_seconds(&self) -> u32 {
        self.day_seconds
    }

    // Keep even seconds on a two-second tick.
    fn align(&mut self) {
        let t = u32::from(self.tick_seconds);
        self.day_seconds -= self.day_seconds % t;
    }
}

impl Clock for SimClock {
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
        self.sub_cycle
    }
}

/// Local time from the ESP-IDF system clock.
#[cfg(target_os = "espidf")]
pub struct RtcClock {
    tick_us: u64,
}

#[cfg(target_os = "espidf")]
impl RtcClock {
    pub fn new(tick_seconds: u8) -> Self {
        Self {
            tick_us: u64::from(tick_seconds.max(1)) * 1_000_000,
        }
    }

    /// Broken-down local time, or `None` before the clock has been set.
    fn local_tm(&self) -> Option<esp_idf_svc::sys::tm> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        Some(tm)
    }
}

#[cfg(target_os = "espidf")]
impl Clock for RtcClock {
    fn seconds_of_minute(&self) -> u8 {
        self.local_tm().map_or(0, |tm| tm.tm_sec.clamp(0, 59) as u8)
    }

    fn minutes_of_hour(&self) -> u8 {
        self.local_tm().map_or(0, |tm| tm.tm_min.clamp(0, 59) as u8)
    }

    fn hours_of_day(&self) -> u8 {
        self.local_tm().map_or(0, |tm| tm.tm_hour.clamp(0, 23) as u8)
    }

    fn sub_cycle_time(&self) -> u8 {
        let now = (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64;
        ((now % self.tick_us) * 256 / self.tick_us) as u8
    }
}
