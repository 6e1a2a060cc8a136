//! FROST / WARM / BAKE mode state.
//!
//! Every entry point expects already-debounced input; nothing here filters.
//! BAKE always implies WARM.

use log::info;

/// Minutes a BAKE lasts unless the target is reached first.
pub const BAKE_MAX_M: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Frost,
    Warm,
    Bake,
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Frost => "FROST",
            Self::Warm => "WARM",
            Self::Bake => "BAKE",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModeState {
    warm: bool,
    bake_countdown_m: u8,
    bake_supported: bool,
}

impl ModeState {
    pub const fn new(bake_supported: bool) -> Self {
        Self {
            warm: false,
            bake_countdown_m: 0,
            bake_supported,
        }
    }

    pub fn mode(&self) -> Mode {
        if !self.warm {
            Mode::Frost
        } else if self.bake_countdown_m > 0 {
            Mode::Bake
        } else {
            Mode::Warm
        }
    }

    pub fn in_warm_mode(&self) -> bool {
        self.warm
    }

    pub fn in_bake_mode(&self) -> bool {
        self.warm && self.bake_countdown_m > 0
    }

    pub fn bake_countdown_m(&self) -> u8 {
        self.bake_countdown_m
    }

    /// Force WARM or FROST. Entering FROST cancels any BAKE.
    pub fn set_warm_mode(&mut self, warm: bool) {
        if warm != self.warm {
            info!("mode: {}", if warm { "WARM" } else { "FROST" });
        }
        self.warm = warm;
        if !warm {
            self.bake_countdown_m = 0;
        }
    }

    /// Start (or restart) BAKE. Implies WARM. Returns `false` if BAKE is not
    /// supported on this node.
    pub fn start_bake(&mut self) -> bool {
        if !self.bake_supported {
            return false;
        }
        self.warm = true;
        self.bake_countdown_m = BAKE_MAX_M;
        info!("mode: BAKE for {} min", BAKE_MAX_M);
        true
    }

    /// Drop back to plain WARM.
    pub fn cancel_bake(&mut self) {
        self.bake_countdown_m = 0;
    }

    /// Once-a-minute BAKE bookkeeping: expire it when the room no longer
    /// calls for heat, otherwise run the countdown down.
    pub fn tick_bake(&mut self, calling_for_heat: bool) {
        if self.bake_countdown_m == 0 {
            return;
        }
        if calling_for_heat {
            self.bake_countdown_m -= 1;
        } else {
            self.bake_countdown_m = 0;
        }
        if self.bake_countdown_m == 0 {
            info!("mode: BAKE finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_frost() {
        let m = ModeState::new(true);
        assert_eq!(m.mode(), Mode::Frost);
    }

    #[test]
    fn bake_implies_warm_and_frost_cancels_bake() {
        let mut m = ModeState::new(true);
        assert!(m.start_bake());
        assert_eq!(m.mode(), Mode::Bake);
        assert!(m.in_warm_mode());
        m.set_warm_mode(false);
        assert_eq!(m.mode(), Mode::Frost);
        assert_eq!(m.bake_countdown_m(), 0);
    }

    #[test]
    fn bake_unsupported_is_refused() {
        let mut m = ModeState::new(false);
        m.set_warm_mode(true);
        assert!(!m.start_bake());
        assert_eq!(m.mode(), Mode::Warm);
    }

    #[test]
    fn bake_runs_down_while_calling_for_heat() {
        let mut m = ModeState::new(true);
        m.start_bake();
        for _ in 0..BAKE_MAX_M - 1 {
            m.tick_bake(true);
        }
        assert!(m.in_bake_mode());
        m.tick_bake(true);
        assert_eq!(m.mode(), Mode::Warm);
    }

    #[test]
    fn bake_ends_when_target_reached() {
        let mut m = ModeState::new(true);
        m.start_bake();
        m.tick_bake(false);
        assert_eq!(m.mode(), Mode::Warm);
    }
}
