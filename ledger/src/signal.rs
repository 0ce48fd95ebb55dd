//! Cosmetic multiplier shown after a credit is spent.
//!
//! The value is random and carries no information; it exists so the
//! predictor screen has something to reveal.

use rand::Rng;
use std::fmt;
use std::ops::Range;

/// Chance of drawing from the high band.
pub const RARE_SIGNAL_PROBABILITY: f64 = 2.0 / 25.0;
const RARE_BAND: Range<f64> = 2.20..3.10;
const COMMON_BAND: Range<f64> = 1.10..2.20;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Signal(f64);

impl Signal {
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let band = if rng.gen_bool(RARE_SIGNAL_PROBABILITY) {
            RARE_BAND
        } else {
            COMMON_BAND
        };
        Self(rng.gen_range(band))
    }

    pub fn multiplier(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}
