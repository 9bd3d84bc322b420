//! Seedable random source
//!
//! Every random draw in the crate flows through [`RandomSource`]: uniform,
//! ranged-uniform, exponential and discrete-categorical sampling. Identical
//! seeds produce identical sequences, which is what makes whole-forest runs
//! reproducible and lets each tree carry its own generator.

use nalgebra::DVector;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Exp;

pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    /// Creates a random source from an optional seed. `None` seeds from
    /// operating-system entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Draws a fresh seed, used to fan out child generators.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen::<u64>()
    }

    /// Uniform draw from `[0, 1)`.
    pub fn uniform(&mut self) -> f32 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Uniform draw from `[min, max)`. A degenerate interval collapses to
    /// `min`.
    pub fn uniform_range(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        }
    }

    /// Exponential draw with the given rate. A non-positive rate has no mass
    /// anywhere finite, so it yields infinity; callers treat that as "no
    /// further split".
    pub fn exponential(&mut self, rate: f32) -> f32 {
        match Exp::new(rate) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => f32::INFINITY,
        }
    }

    /// Draws an index with probability proportional to `weights`. Negative
    /// weights are treated as zero.
    pub fn categorical(&mut self, weights: &DVector<f32>) -> Result<usize, String> {
        let clamped = weights.iter().map(|w| w.max(0.0) as f64);
        let dist = WeightedIndex::new(clamped)
            .map_err(|error| format!("Invalid categorical weights: {}.", error))?;
        Ok(dist.sample(&mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sequences_match() {
        let mut a = RandomSource::new(Some(42));
        let mut b = RandomSource::new(Some(42));
        for _ in 0..100 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn test_uniform_range_bounds() {
        let mut rng = RandomSource::new(Some(7));
        for _ in 0..100 {
            let value = rng.uniform_range(2.0, 3.0);
            assert!((2.0..3.0).contains(&value));
        }
    }

    #[test]
    fn test_uniform_range_degenerate() {
        let mut rng = RandomSource::new(Some(7));
        assert_eq!(rng.uniform_range(5.0, 5.0), 5.0);
    }

    #[test]
    fn test_exponential_non_positive_rate() {
        let mut rng = RandomSource::new(Some(7));
        assert!(rng.exponential(0.0).is_infinite());
        assert!(rng.exponential(-1.0).is_infinite());
    }

    #[test]
    fn test_exponential_positive() {
        let mut rng = RandomSource::new(Some(7));
        for _ in 0..100 {
            let value = rng.exponential(2.5);
            assert!(value.is_finite());
            assert!(value >= 0.0);
        }
    }

    #[test]
    fn test_categorical_respects_zero_weights() {
        let mut rng = RandomSource::new(Some(7));
        let weights = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        for _ in 0..50 {
            assert_eq!(rng.categorical(&weights).unwrap(), 1);
        }
    }

    #[test]
    fn test_categorical_clamps_negative_weights() {
        let mut rng = RandomSource::new(Some(7));
        let weights = DVector::from_vec(vec![-3.0, 2.0]);
        for _ in 0..50 {
            assert_eq!(rng.categorical(&weights).unwrap(), 1);
        }
    }

    #[test]
    fn test_categorical_all_zero_is_error() {
        let mut rng = RandomSource::new(Some(7));
        let weights = DVector::from_vec(vec![0.0, 0.0]);
        assert!(rng.categorical(&weights).is_err());
    }
}
