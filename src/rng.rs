//! Small, fast 8-bit pseudo-random generator.
//!
//! Not remotely cryptographic. It only supplies transmit jitter and the
//! stochastic rounding term used when smoothing stats, and it is reseeded
//! once a minute from sensor noise and radio RSSI.

use crate::app::ports::RandomSource;

/// xor/add generator with four bytes of state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rng8 {
    x: u8,
    a: u8,
    b: u8,
    c: u8,
}

impl Rng8 {
    pub const fn new() -> Self {
        Self {
            x: 0,
            a: 0,
            b: 0,
            c: 0,
        }
    }

    /// Generator already stirred with the given seed bytes.
    pub fn seeded(s1: u8, s2: u8, s3: u8) -> Self {
        let mut rng = Self::new();
        rng.seed(s1, s2, s3);
        rng
    }

    /// Mix entropy into the state. Never resets it, so repeated seeding
    /// with poor entropy cannot make the output worse.
    pub fn seed(&mut self, s1: u8, s2: u8, s3: u8) {
        self.a ^= s1;
        self.b ^= s2;
        self.c ^= s3;
        self.step();
    }

    fn step(&mut self) -> u8 {
        self.x = self.x.wrapping_add(1);
        self.a ^= self.c ^ self.x;
        self.b = self.b.wrapping_add(self.a);
        self.c = self.c.wrapping_add(self.b >> 1) ^ self.a;
        self.c
    }
}

impl RandomSource for Rng8 {
    fn next_u8(&mut self) -> u8 {
        self.step()
    }
}
