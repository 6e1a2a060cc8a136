//! Ambient light tracking.
//!
//! Turns the raw 8-bit light level into lit/dark state with hysteresis and
//! counts how long the room has been dark. A dark-to-lit transition is
//! weak evidence that someone has come in.

use log::debug;

/// At or below this raw level the room is dark.
pub const DARK_THRESHOLD: u8 = 30;
/// At or above this raw level the room is lit.
pub const LIT_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Default)]
pub struct AmbientLight {
    level: u8,
    is_room_lit: bool,
    dark_minutes: u8,
}

impl AmbientLight {
    pub const fn new() -> Self {
        Self {
            level: 0,
            is_room_lit: false,
            dark_minutes: 0,
        }
    }

    /// Feed a fresh reading; expected once a minute. Returns `true` if the
    /// room has just gone from dark to lit.
    pub fn update(&mut self, level: u8) -> bool {
        self.level = level;
        let was_lit = self.is_room_lit;
        if level >= LIT_THRESHOLD {
            self.is_room_lit = true;
        } else if level <= DARK_THRESHOLD {
            self.is_room_lit = false;
        }
        if self.is_room_lit {
            self.dark_minutes = 0;
        } else {
            self.dark_minutes = self.dark_minutes.saturating_add(1);
        }
        let lights_on = self.is_room_lit && !was_lit;
        if lights_on {
            debug!("ambient: lights on at level {}", level);
        }
        lights_on
    }

    /// Raw level from the last reading.
    pub fn get(&self) -> u8 {
        self.level
    }

    pub fn is_room_lit(&self) -> bool {
        self.is_room_lit
    }

    pub fn is_room_dark(&self) -> bool {
        !self.is_room_lit
    }

    /// Consecutive dark minutes, saturating at 255.
    pub fn dark_minutes(&self) -> u8 {
        self.dark_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_holds_state_in_the_middle_band() {
        let mut a = AmbientLight::new();
        assert!(a.update(60));
        assert!(!a.update(40));
        assert!(a.is_room_lit());
        a.update(20);
        assert!(a.is_room_dark());
        a.update(40);
        assert!(a.is_room_dark());
    }

    #[test]
    fn dark_minutes_count_and_reset() {
        let mut a = AmbientLight::new();
        for _ in 0..12 {
            a.update(5);
        }
        assert_eq!(a.dark_minutes(), 12);
        a.update(200);
        assert_eq!(a.dark_minutes(), 0);
    }

    #[test]
    fn dark_minutes_saturate() {
        let mut a = AmbientLight::new();
        for _ in 0..300 {
            a.update(0);
        }
        assert_eq!(a.dark_minutes(), u8::MAX);
    }
}
