//! Boiler call-for-heat output over an `embedded-hal` pin.
//!
//! The scheduler sets the output every tick; only changes reach the pin.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{info, warn};

pub struct HeatCallOutput<PIN> {
    pin: PIN,
    on: Option<bool>,
}

impl<PIN: OutputPin> HeatCallOutput<PIN> {
    pub fn new(pin: PIN) -> Self {
        Self { pin, on: None }
    }

    /// Drive the output. Pin errors are logged and retried next tick.
    pub fn set(&mut self, on: bool) {
        if self.on == Some(on) {
            return;
        }
        let result = if on { self.pin.set_high() } else { self.pin.set_low() };
        match result {
            Ok(()) => {
                info!("heat call output {}", if on { "on" } else { "off" });
                self.on = Some(on);
            }
            Err(_) => {
                warn!("heat call output: pin write failed");
                self.on = None;
            }
        }
    }

    pub fn is_on(&self) -> bool {
        self.on == Some(true)
    }

    pub fn pin(&self) -> &PIN {
        &self.pin
    }
}

/// Pin that only records its level, for the simulator and tests.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    writes: u32,
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Level changes written so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_changes_reach_the_pin() {
        let mut out = HeatCallOutput::new(SimPin::default());
        out.set(false);
        out.set(false);
        out.set(true);
        out.set(true);
        assert!(out.is_on());
        assert!(out.pin().is_high());
        assert_eq!(out.pin().writes(), 2);
    }
}
