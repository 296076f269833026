//! 64-bit linear congruential generator
//!
//! The cheapest engine available. Low bits have short periods, so only the
//! high bits are used for floating-point output.

use serde::{Deserialize, Serialize};

const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Knuth MMIX constants LCG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearCongruential {
    state: u64,
}

impl LinearCongruential {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform f64 in [0.0, 1.0) built from the high 53 bits
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }
}
