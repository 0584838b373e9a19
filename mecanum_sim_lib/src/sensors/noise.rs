//! Gaussian range noise for scanner output
//!
//! Noise is a post-processing step on finished readings; sensing itself stays
//! deterministic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Noise generator with configurable seed for reproducibility
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    rng: StdRng,
}

impl NoiseGenerator {
    /// A seed of 0 draws entropy from the OS; any other seed is reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_os_rng()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Perturb every reading that is a return (below `max_range`). Noisy values
    /// are clamped to `[0, max_range)` so a return never turns into a miss.
    pub fn perturb_returns(&mut self, ranges: &mut [f64], max_range: f64, stddev: f64) {
        for r in ranges.iter_mut().filter(|r| **r < max_range) {
            let noisy = *r + self.gaussian(stddev);
            *r = noisy.clamp(0.0, max_range - f64::EPSILON * max_range);
        }
    }
}
