//! Occupancy tracking.
//!
//! A decaying confidence derived from an occupation countdown, plus
//! vacancy and recent-activity timers. [`OccupancyTracker::read`] runs once
//! a minute from the main loop; the `mark_*` methods may be called from
//! interrupt context (light, voice, button edges). All counters live in one
//! value behind a critical-section mutex so neither side sees a torn update.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Minutes of occupation after strong evidence of activity.
pub const OCCUPATION_TIMEOUT_M: u8 = 50;
/// Minutes of occupation after weak evidence of activity.
pub const OCCUPATION_TIMEOUT_MAYBE_M: u8 = 25;
/// Minutes a burst of activity counts as "recent".
pub const ACTIVITY_TIMEOUT_M: u8 = 2;
/// Hours of vacancy before the room is "long vacant".
pub const LONG_VACANT_H: u8 = 8;
/// Hours of vacancy before the room is "long long vacant".
pub const LONG_LONG_VACANT_H: u8 = 24;

// Scale so that a full countdown maps to exactly 100%.
const CONFIDENCE_SHIFT: u8 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    confidence: u8,
    occupation_countdown_m: u8,
    vacancy_m: u8,
    vacancy_h: u8,
    activity_countdown_m: u8,
}

/// Snapshot of the tracker, read atomically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub confidence: u8,
    pub occupation_countdown_m: u8,
    pub vacancy_h: u8,
    pub activity_countdown_m: u8,
}

/// Interrupt-safe occupancy state. Intended to live in a `static`.
pub struct OccupancyTracker {
    counters: Mutex<CriticalSectionRawMutex, Cell<Counters>>,
    indicator: Option<fn()>,
}

impl OccupancyTracker {
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(Counters {
                confidence: 0,
                occupation_countdown_m: 0,
                vacancy_m: 0,
                vacancy_h: 0,
                activity_countdown_m: 0,
            })),
            indicator: None,
        }
    }

    /// Tracker that calls `indicator` (e.g. flash an LED) whenever activity
    /// is marked. The callback runs in the caller's context, so it must be
    /// interrupt safe.
    pub const fn with_indicator(indicator: fn()) -> Self {
        let mut t = Self::new();
        t.indicator = Some(indicator);
        t
    }

    fn update<R>(&self, f: impl FnOnce(&mut Counters) -> R) -> R {
        self.counters.lock(|cell| {
            let mut c = cell.get();
            let r = f(&mut c);
            cell.set(c);
            r
        })
    }

    fn get_counters(&self) -> Counters {
        self.counters.lock(Cell::get)
    }

    /// Once-a-minute update. Recomputes confidence from the countdown, then
    /// runs the countdown down (or the vacancy timers up) and the activity
    /// timer down. Returns the new confidence, 0..=100; always 0 once the
    /// countdown has expired.
    pub fn read(&self) -> u8 {
        self.update(|c| {
            c.confidence = if c.occupation_countdown_m == 0 {
                0
            } else {
                let lost = (OCCUPATION_TIMEOUT_M - c.occupation_countdown_m) << CONFIDENCE_SHIFT;
                100u8.saturating_sub(lost)
            };
            if c.occupation_countdown_m > 0 {
                c.occupation_countdown_m -= 1;
                c.vacancy_m = 0;
                c.vacancy_h = 0;
            } else if c.vacancy_h < u8::MAX {
                c.vacancy_m += 1;
                if c.vacancy_m >= 60 {
                    c.vacancy_m = 0;
                    c.vacancy_h += 1;
                }
            }
            if c.occupation_countdown_m == 0 {
                c.confidence = 0;
            }
            c.activity_countdown_m = c.activity_countdown_m.saturating_sub(1);
            c.confidence
        })
    }

    /// Weak evidence of occupation, e.g. lights on or voice. Interrupt safe.
    pub fn mark_as_possibly_occupied(&self) {
        if let Some(indicator) = self.indicator {
            indicator();
        }
        self.update(|c| {
            c.occupation_countdown_m = c.occupation_countdown_m.max(OCCUPATION_TIMEOUT_MAYBE_M);
            c.activity_countdown_m = ACTIVITY_TIMEOUT_M;
        });
    }

    /// Strong evidence of occupation, e.g. manual control. Interrupt safe.
    pub fn mark_as_occupied(&self) {
        self.update(|c| {
            c.occupation_countdown_m = OCCUPATION_TIMEOUT_M;
            c.activity_countdown_m = ACTIVITY_TIMEOUT_M;
        });
    }

    /// Confidence as of the last [`read`](Self::read).
    pub fn get(&self) -> u8 {
        self.get_counters().confidence
    }

    pub fn snapshot(&self) -> OccupancySnapshot {
        let c = self.get_counters();
        OccupancySnapshot {
            confidence: c.confidence,
            occupation_countdown_m: c.occupation_countdown_m,
            vacancy_h: c.vacancy_h,
            activity_countdown_m: c.activity_countdown_m,
        }
    }

    pub fn is_likely_occupied(&self) -> bool {
        self.get_counters().occupation_countdown_m != 0
    }

    pub fn is_likely_unoccupied(&self) -> bool {
        !self.is_likely_occupied()
    }

    /// Strong activity within roughly the last half hour.
    pub fn is_likely_recently_occupied(&self) -> bool {
        self.get_counters().occupation_countdown_m > OCCUPATION_TIMEOUT_M - OCCUPATION_TIMEOUT_MAYBE_M
    }

    /// Activity was reported in the last couple of minutes.
    pub fn reported_recently(&self) -> bool {
        self.get_counters().activity_countdown_m != 0
    }

    /// Whole hours of continuous vacancy, saturating at 255.
    pub fn vacancy_h(&self) -> u8 {
        self.get_counters().vacancy_h
    }

    pub fn long_vacant(&self) -> bool {
        self.vacancy_h() > LONG_VACANT_H
    }

    pub fn long_long_vacant(&self) -> bool {
        self.vacancy_h() > LONG_LONG_VACANT_H
    }

    /// Wire code: 1 unoccupied, 2 possibly occupied, 3 probably occupied.
    /// 0 (undisclosed) is chosen by the caller.
    pub fn two_bit_value(&self) -> u8 {
        if self.is_likely_recently_occupied() {
            3
        } else if self.is_likely_occupied() {
            2
        } else {
            1
        }
    }

    /// Restore timers, e.g. after a reset or in tests.
    pub fn set_vacancy_h(&self, hours: u8) {
        self.update(|c| {
            c.occupation_countdown_m = 0;
            c.confidence = 0;
            c.vacancy_m = 0;
            c.vacancy_h = hours;
        });
    }
}

impl Default for OccupancyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU8, Ordering};

    #[test]
    fn starts_unoccupied_with_zero_confidence() {
        let t = OccupancyTracker::new();
        assert_eq!(t.read(), 0);
        assert!(t.is_likely_unoccupied());
        assert_eq!(t.two_bit_value(), 1);
    }

    #[test]
    fn full_countdown_gives_full_confidence_then_decays() {
        let t = OccupancyTracker::new();
        t.mark_as_occupied();
        assert_eq!(t.read(), 100);
        assert_eq!(t.read(), 98);
        assert_eq!(t.two_bit_value(), 3);
    }

    #[test]
    fn possible_occupation_gives_half_confidence() {
        let t = OccupancyTracker::new();
        t.mark_as_possibly_occupied();
        assert!(t.reported_recently());
        assert_eq!(t.read(), 50);
        assert_eq!(t.two_bit_value(), 2);
    }

    #[test]
    fn weak_evidence_never_shortens_countdown() {
        let t = OccupancyTracker::new();
        t.mark_as_occupied();
        t.mark_as_possibly_occupied();
        assert_eq!(t.snapshot().occupation_countdown_m, OCCUPATION_TIMEOUT_M);
    }

    #[test]
    fn confidence_zero_when_countdown_expired() {
        let t = OccupancyTracker::new();
        t.mark_as_possibly_occupied();
        for _ in 1..OCCUPATION_TIMEOUT_MAYBE_M {
            assert!(t.read() > 0);
        }
        assert_eq!(t.read(), 0);
        assert_eq!(t.snapshot().occupation_countdown_m, 0);
        assert_eq!(t.get(), 0);
    }

    #[test]
    fn vacancy_accumulates_in_hours() {
        let t = OccupancyTracker::new();
        for _ in 0..(60 * 9) {
            t.read();
        }
        assert_eq!(t.vacancy_h(), 9);
        assert!(t.long_vacant());
        assert!(!t.long_long_vacant());
        t.mark_as_possibly_occupied();
        t.read();
        assert_eq!(t.vacancy_h(), 0);
    }

    #[test]
    fn activity_timer_runs_down() {
        let t = OccupancyTracker::new();
        t.mark_as_possibly_occupied();
        t.read();
        assert!(t.reported_recently());
        t.read();
        assert!(!t.reported_recently());
    }

    static FLASHES: AtomicU8 = AtomicU8::new(0);

    fn flash() {
        FLASHES.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn indicator_fires_on_possible_occupation() {
        static T: OccupancyTracker = OccupancyTracker::with_indicator(flash);
        T.mark_as_possibly_occupied();
        T.mark_as_possibly_occupied();
        assert_eq!(FLASHES.load(Ordering::Relaxed), 2);
    }
}
