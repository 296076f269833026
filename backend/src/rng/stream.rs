//! Named random streams
//!
//! A stream wraps one engine plus the distribution helpers business logic needs:
//! probability rolls, uniform ranges, gaussian and ex-gaussian draws. Streams
//! also carry the variance-reduction flags (`average_range`, `average_gauss`)
//! which replace draws by their closed-form means.
//!
//! Every engine implements [`RngCore`], so normal and exponential variates
//! come straight from `rand_distr`.

use super::linear::LinearCongruential;
use super::xorshift::XorShift64Star;
use super::RngError;
use crate::core::SimTime;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Exp1, StandardNormal};
use serde::{Deserialize, Serialize};

/// Engine selection for every stream of an iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngAlgorithm {
    /// 64-bit LCG, cheapest
    Linear,
    /// xorshift64*
    #[default]
    XorShift,
    /// ChaCha8, vectorised block generator with the best statistical quality
    ChaCha,
}

#[derive(Debug, Clone)]
enum Engine {
    Linear(LinearCongruential),
    XorShift(XorShift64Star),
    ChaCha(Box<ChaCha8Rng>),
}

impl Engine {
    fn new(algorithm: RngAlgorithm, seed: u64) -> Self {
        match algorithm {
            RngAlgorithm::Linear => Engine::Linear(LinearCongruential::new(seed)),
            RngAlgorithm::XorShift => Engine::XorShift(XorShift64Star::new(seed)),
            RngAlgorithm::ChaCha => Engine::ChaCha(Box::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }
}

impl RngCore for Engine {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            Engine::Linear(rng) => rng.next_u64(),
            Engine::XorShift(rng) => rng.next_u64(),
            Engine::ChaCha(rng) => rng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Per-stream usage counters, reported for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUsage {
    /// Number of probability rolls that consumed a draw
    pub rolls: u64,
    /// Rolls that came up true
    pub successes: u64,
    /// Sum of requested probabilities (expected successes)
    pub expected_successes: f64,
    /// Variates taken from the engine (uniform, normal or exponential)
    pub draws: u64,
}

/// A named, independently seedable random stream
///
/// # Example
/// ```
/// use combat_simulator_core_rs::rng::{RngAlgorithm, RngStream};
///
/// let mut stream = RngStream::new("crit", RngAlgorithm::XorShift, 7);
/// let hits = (0..1000).filter(|_| stream.roll(0.25)).count();
/// assert!(hits > 150 && hits < 350);
/// ```
#[derive(Debug, Clone)]
pub struct RngStream {
    name: String,
    algorithm: RngAlgorithm,
    engine: Engine,
    average_range: bool,
    average_gauss: bool,
    usage: StreamUsage,
}

impl RngStream {
    pub fn new(name: impl Into<String>, algorithm: RngAlgorithm, seed: u64) -> Self {
        Self {
            name: name.into(),
            algorithm,
            engine: Engine::new(algorithm, seed),
            average_range: false,
            average_gauss: false,
            usage: StreamUsage::default(),
        }
    }

    /// Enable closed-form means for uniform/gaussian draws
    pub fn with_averaging(mut self, average_range: bool, average_gauss: bool) -> Self {
        self.average_range = average_range;
        self.average_gauss = average_gauss;
        self
    }

    /// Restart the stream from a new seed and clear its counters
    pub fn reseed(&mut self, seed: u64) {
        self.engine = Engine::new(self.algorithm, seed);
        self.usage = StreamUsage::default();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> RngAlgorithm {
        self.algorithm
    }

    pub fn usage(&self) -> StreamUsage {
        self.usage
    }

    /// Raw uniform draw in [0, 1)
    pub fn real(&mut self) -> f64 {
        self.usage.draws += 1;
        self.engine.gen::<f64>()
    }

    // ========================================================================
    // Probability rolls
    // ========================================================================

    /// Roll with probability `chance`, rejecting probabilities outside [0, 1]
    ///
    /// Certain outcomes (`chance` of exactly 0 or 1) never consume a draw.
    pub fn try_roll(&mut self, chance: f64) -> Result<bool, RngError> {
        if !(0.0..=1.0).contains(&chance) {
            return Err(RngError::InvalidProbability {
                stream: self.name.clone(),
                chance,
            });
        }
        Ok(self.roll_unchecked(chance))
    }

    /// Roll with probability `chance`
    ///
    /// Out-of-range probabilities are a programming error: debug builds assert,
    /// release builds clamp into [0, 1].
    pub fn roll(&mut self, chance: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&chance),
            "roll probability {} outside [0, 1] on stream '{}'",
            chance,
            self.name
        );
        self.roll_unchecked(chance.clamp(0.0, 1.0))
    }

    fn roll_unchecked(&mut self, chance: f64) -> bool {
        if chance <= 0.0 {
            return false;
        }
        if chance >= 1.0 {
            return true;
        }
        self.usage.rolls += 1;
        self.usage.expected_successes += chance;
        let success = self.real() < chance;
        if success {
            self.usage.successes += 1;
        }
        success
    }

    // ========================================================================
    // Continuous distributions
    // ========================================================================

    /// Uniform value in [min, max)
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if self.average_range {
            return (min + max) / 2.0;
        }
        min + (max - min) * self.real()
    }

    /// Uniform time in [min, max)
    pub fn uniform_time(&mut self, min: SimTime, max: SimTime) -> SimTime {
        SimTime::from_secs_f64(self.uniform(min.as_secs_f64(), max.as_secs_f64()))
    }

    fn std_normal(&mut self) -> f64 {
        self.usage.draws += 1;
        self.engine.sample(StandardNormal)
    }

    fn std_exponential(&mut self) -> f64 {
        self.usage.draws += 1;
        self.engine.sample(Exp1)
    }

    /// Gaussian draw; with `truncate_low_end`, negative results become 0
    pub fn gaussian(&mut self, mean: f64, stddev: f64, truncate_low_end: bool) -> f64 {
        let value = if self.average_gauss || stddev <= 0.0 {
            mean
        } else {
            mean + stddev * self.std_normal()
        };
        if truncate_low_end && value < 0.0 {
            0.0
        } else {
            value
        }
    }

    /// Non-negative gaussian time
    pub fn gaussian_time(&mut self, mean: SimTime, stddev: SimTime) -> SimTime {
        SimTime::from_secs_f64(self.gaussian(mean.as_secs_f64(), stddev.as_secs_f64(), true))
    }

    /// Ex-gaussian draw: a truncated gaussian plus an exponential tail
    ///
    /// The tail is `nu_multiplier` times a unit exponential, capped at
    /// `cutoff * nu_divisor`.
    /// Under `average_gauss` the closed-form mean `mean + nu_multiplier` is returned.
    pub fn exgaussian(
        &mut self,
        mean: f64,
        stddev: f64,
        nu_divisor: f64,
        nu_multiplier: f64,
        cutoff: f64,
    ) -> f64 {
        if self.average_gauss {
            return (mean + nu_multiplier).max(0.0);
        }
        let gauss = self.gaussian(mean, stddev, true);
        let tail = if nu_multiplier > 0.0 {
            (self.std_exponential() * nu_multiplier).min(cutoff * nu_divisor)
        } else {
            0.0
        };
        gauss + tail
    }

    /// Ex-gaussian time with the tail mean used for both divisor and multiplier
    pub fn exgaussian_time(
        &mut self,
        mean: SimTime,
        stddev: SimTime,
        nu: SimTime,
        cutoff: f64,
    ) -> SimTime {
        let nu = nu.as_secs_f64();
        SimTime::from_secs_f64(self.exgaussian(
            mean.as_secs_f64(),
            stddev.as_secs_f64(),
            nu,
            nu,
            cutoff,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(algorithm: RngAlgorithm) -> RngStream {
        RngStream::new("test", algorithm, 2024)
    }

    #[test]
    fn test_certain_rolls_consume_no_draws() {
        let mut s = stream(RngAlgorithm::XorShift);
        assert!(s.roll(1.0));
        assert!(!s.roll(0.0));
        assert_eq!(s.usage().draws, 0);
        assert_eq!(s.usage().rolls, 0);
    }

    #[test]
    fn test_try_roll_rejects_out_of_range() {
        let mut s = stream(RngAlgorithm::XorShift);
        assert!(matches!(
            s.try_roll(1.5),
            Err(RngError::InvalidProbability { .. })
        ));
        assert!(s.try_roll(-0.1).is_err());
        assert!(s.try_roll(0.5).is_ok());
    }

    #[test]
    fn test_every_algorithm_is_reproducible() {
        for algorithm in [RngAlgorithm::Linear, RngAlgorithm::XorShift, RngAlgorithm::ChaCha] {
            let mut a = stream(algorithm);
            let mut b = stream(algorithm);
            let xs: Vec<f64> = (0..100).map(|_| a.real()).collect();
            let ys: Vec<f64> = (0..100).map(|_| b.real()).collect();
            assert_eq!(xs, ys, "{:?} not reproducible", algorithm);
        }
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut s = stream(RngAlgorithm::ChaCha);
        let first: Vec<f64> = (0..10).map(|_| s.real()).collect();
        s.reseed(2024);
        let second: Vec<f64> = (0..10).map(|_| s.real()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_average_range_returns_midpoint() {
        let mut s = stream(RngAlgorithm::XorShift).with_averaging(true, false);
        assert_eq!(s.uniform(100.0, 200.0), 150.0);
        assert_eq!(s.usage().draws, 0);
    }

    #[test]
    fn test_average_gauss_returns_mean() {
        let mut s = stream(RngAlgorithm::XorShift).with_averaging(false, true);
        assert_eq!(s.gaussian(0.5, 0.1, false), 0.5);
        assert_eq!(s.exgaussian(0.25, 0.05, 0.25, 0.25, 5.0), 0.5);
    }

    #[test]
    fn test_gaussian_moments() {
        let mut s = stream(RngAlgorithm::XorShift);
        let n = 50_000;
        let draws: Vec<f64> = (0..n).map(|_| s.gaussian(10.0, 2.0, false)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert!((mean - 10.0).abs() < 0.05, "mean {}", mean);
        assert!((var.sqrt() - 2.0).abs() < 0.05, "stddev {}", var.sqrt());
    }

    #[test]
    fn test_truncated_gaussian_is_non_negative() {
        let mut s = stream(RngAlgorithm::Linear);
        for _ in 0..10_000 {
            assert!(s.gaussian(0.0, 1.0, true) >= 0.0);
        }
    }

    #[test]
    fn test_exgaussian_tail_mean() {
        let mut s = stream(RngAlgorithm::ChaCha);
        let n = 50_000;
        let mean = (0..n)
            .map(|_| s.exgaussian(0.0, 0.0, 0.2, 0.2, 1.0e6))
            .sum::<f64>()
            / n as f64;
        assert!((mean - 0.2).abs() < 0.005, "mean {}", mean);
        assert_eq!(s.usage().draws, n);
    }

    #[test]
    fn test_engines_share_uniform_mapping() {
        let mut engine = Engine::new(RngAlgorithm::XorShift, 99);
        let mut raw = XorShift64Star::new(99);
        for _ in 0..100 {
            assert_eq!(engine.gen::<f64>(), raw.next_f64());
        }
    }

    #[test]
    fn test_exgaussian_tail_is_capped() {
        let mut s = stream(RngAlgorithm::XorShift);
        for _ in 0..10_000 {
            let v = s.exgaussian(0.0, 0.0, 0.1, 0.1, 5.0);
            assert!((0.0..=0.5 + 1e-12).contains(&v), "value {} exceeds cutoff", v);
        }
    }
}
