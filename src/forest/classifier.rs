//! Mondrian forest: a fixed-size collection of independent trees.

use std::error::Error;

use nalgebra::DVector;
use rayon::prelude::*;

use super::node::ConfidenceState;
use super::settings::MondrianSettings;
use super::tree::MondrianTree;
use crate::data::Sample;
use crate::rng::RandomSource;

/// Sentinel returned when the averaged posterior carries no decision (all
/// classes equally likely). Callers treat it as a random guess.
pub const NO_DECISION: i32 = -2;

/// A forest of independently grown Mondrian trees. Every tree carries its
/// own random source seeded from the forest's master seed, so trees share no
/// mutable state and the per-tree fan-out can run in parallel without
/// changing results.
pub struct MondrianForest {
    trees: Vec<MondrianTree>,
    settings: MondrianSettings,
    data_counter: u32,
    rng: RandomSource,
}

impl MondrianForest {
    /// Creates a forest for the given feature dimension. `seed = None` seeds
    /// from entropy; any fixed seed makes the whole forest reproducible.
    pub fn new(settings: MondrianSettings, feature_dim: usize, seed: Option<u64>) -> Self {
        let mut rng = RandomSource::new(seed);
        let trees = (0..settings.num_trees)
            .map(|_| MondrianTree::new(feature_dim, rng.next_seed()))
            .collect();
        Self {
            trees,
            settings,
            data_counter: 0,
            rng,
        }
    }

    pub fn settings(&self) -> &MondrianSettings {
        &self.settings
    }

    /// Number of samples this forest has been trained on.
    pub fn data_counter(&self) -> u32 {
        self.data_counter
    }

    /// Number of classes discovered so far.
    pub fn num_classes(&self) -> usize {
        self.trees.first().map_or(0, |tree| tree.num_classes())
    }

    /// Trains every tree on the sample.
    pub fn update(&mut self, sample: &Sample) -> Result<(), Box<dyn Error>> {
        self.data_counter += 1;
        let settings = &self.settings;
        let updates: Result<Vec<_>, String> = self
            .trees
            .par_iter_mut()
            .map(|tree| tree.update(sample, settings))
            .collect();
        updates?;
        Ok(())
    }

    /// Per-class probabilities averaged over the trees, along with the
    /// averaged normalized leaf density.
    fn predict_probability(&self, sample: &Sample) -> (DVector<f32>, ConfidenceState) {
        let per_tree: Vec<_> = self
            .trees
            .par_iter()
            .map(|tree| tree.classify(sample, &self.settings))
            .collect();

        let mut pred_prob = DVector::zeros(self.num_classes());
        let mut conf = ConfidenceState::default();
        let mut density_sum = 0.0;
        for (prob, tree_conf) in per_tree {
            pred_prob += prob;
            density_sum += tree_conf.normalized_density;
            conf.distance = tree_conf.distance;
            conf.number_of_points = tree_conf.number_of_points;
        }
        let num_trees = self.trees.len() as f32;
        pred_prob /= num_trees;
        conf.normalized_density = density_sum / num_trees;
        (pred_prob, conf)
    }

    /// Predicted class of the sample, or [`NO_DECISION`] when the posterior
    /// is flat.
    pub fn classify(&self, sample: &Sample) -> i32 {
        let (pred_prob, _) = self.predict_probability(sample);
        Self::best_class(&pred_prob)
    }

    /// Predicted class plus the confidence score `1 - u * rho^beta`, where
    /// `u` is the configured uncertainty measure and `rho` the averaged
    /// normalized leaf density.
    pub fn classify_confident(&mut self, sample: &Sample) -> (i32, f32) {
        let (pred_prob, conf) = self.predict_probability(sample);
        let pred_class = Self::best_class(&pred_prob);
        let confidence = self.confidence_prediction(&pred_prob, &conf);
        (pred_class, confidence)
    }

    fn best_class(pred_prob: &DVector<f32>) -> i32 {
        if pred_prob.is_empty() {
            return NO_DECISION;
        }
        if pred_prob.len() > 1 && pred_prob.iter().all(|&p| p == pred_prob[0]) {
            return NO_DECISION;
        }
        let mut best_value = 0.0;
        let mut best_class = 0;
        for (class, &probability) in pred_prob.iter().enumerate() {
            if probability > best_value {
                best_value = probability;
                best_class = class as i32;
            }
        }
        best_class
    }

    fn confidence_prediction(&mut self, pred_prob: &DVector<f32>, conf: &ConfidenceState) -> f32 {
        let uncertainty = match self.settings.confidence_measure {
            0 => {
                // Complement of the best-vs-second-best margin.
                let first = pred_prob.iter().cloned().fold(0.0, f32::max);
                let second = pred_prob
                    .iter()
                    .cloned()
                    .filter(|&p| p < first)
                    .fold(0.0, f32::max);
                1.0 - first + second
            }
            1 => {
                debug_assert!(pred_prob.len() > 1);
                if pred_prob.len() > 1 {
                    let norm = (pred_prob.len() as f32).ln();
                    pred_prob
                        .iter()
                        .filter(|&&p| p > 0.0)
                        .map(|&p| -p * p.ln() / norm)
                        .sum()
                } else {
                    0.0
                }
            }
            2 => conf.normalized_density,
            _ => self.rng.uniform(),
        };
        1.0 - uncertainty * conf.normalized_density.powf(self.settings.density_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(values: &[f32], label: usize) -> Sample {
        Sample {
            x: DVector::from_row_slice(values),
            y: label,
        }
    }

    fn unit_square_stream(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let x0 = (i % 10) as f32 / 10.0;
                let x1 = ((i * 7) % 10) as f32 / 10.0;
                sample(&[x0, x1], 0)
            })
            .collect()
    }

    fn separated_stream(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let x = (i % 20) as f32 / 20.0;
                sample(&[x], usize::from(x > 0.5))
            })
            .collect()
    }

    #[test]
    fn test_single_class_square() {
        let mut settings = MondrianSettings::new();
        settings.set_num_trees(10).unwrap();
        let mut forest = MondrianForest::new(settings, 2, Some(1));
        for s in unit_square_stream(100) {
            forest.update(&s).unwrap();
        }
        for s in unit_square_stream(10) {
            let (pred_prob, _) = forest.predict_probability(&s);
            assert_eq!(pred_prob.len(), 1);
            assert_relative_eq!(pred_prob[0], 1.0, epsilon = 1e-4);
            let (pred_class, confidence) = forest.classify_confident(&s);
            assert_eq!(pred_class, 0);
            assert!(confidence >= 0.9, "confidence too low: {}", confidence);
        }
    }

    #[test]
    fn test_two_separated_classes() {
        let mut settings = MondrianSettings::new();
        settings.set_num_trees(10).unwrap();
        let mut forest = MondrianForest::new(settings, 1, Some(2));
        for s in separated_stream(200) {
            forest.update(&s).unwrap();
        }
        let (low_prob, _) = forest.predict_probability(&sample(&[0.1], 0));
        assert!(low_prob[0] > 0.8, "p0 = {}", low_prob[0]);
        assert_eq!(forest.classify(&sample(&[0.1], 0)), 0);
        let (high_prob, _) = forest.predict_probability(&sample(&[0.9], 1));
        assert!(high_prob[1] > 0.8, "p1 = {}", high_prob[1]);
        assert_eq!(forest.classify(&sample(&[0.9], 1)), 1);
    }

    #[test]
    fn test_posterior_sums_to_one() {
        let settings = MondrianSettings::new();
        let mut forest = MondrianForest::new(settings, 1, Some(3));
        for s in separated_stream(100) {
            forest.update(&s).unwrap();
        }
        for s in separated_stream(20) {
            let (pred_prob, _) = forest.predict_probability(&s);
            assert_relative_eq!(pred_prob.sum(), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_identical_seeds_identical_predictions() {
        let mut a = MondrianForest::new(MondrianSettings::new(), 1, Some(77));
        let mut b = MondrianForest::new(MondrianSettings::new(), 1, Some(77));
        for s in separated_stream(100) {
            a.update(&s).unwrap();
            b.update(&s).unwrap();
        }
        for s in separated_stream(40) {
            let (prob_a, conf_a) = a.predict_probability(&s);
            let (prob_b, conf_b) = b.predict_probability(&s);
            assert_eq!(prob_a, prob_b);
            assert_eq!(conf_a.normalized_density, conf_b.normalized_density);
        }
    }

    #[test]
    fn test_flat_posterior_yields_no_decision() {
        let flat = DVector::from_element(3, 1.0 / 3.0);
        assert_eq!(MondrianForest::best_class(&flat), NO_DECISION);
        let empty = DVector::<f32>::zeros(0);
        assert_eq!(MondrianForest::best_class(&empty), NO_DECISION);
    }

    #[test]
    fn test_argmax_breaks_ties_toward_lowest_index() {
        let probs = DVector::from_vec(vec![0.1, 0.4, 0.4, 0.1]);
        assert_eq!(MondrianForest::best_class(&probs), 1);
    }

    #[test]
    fn test_new_class_growth() {
        let settings = MondrianSettings::new();
        let mut forest = MondrianForest::new(settings, 1, Some(4));
        for label in 0..4 {
            forest.update(&sample(&[label as f32], label)).unwrap();
            assert_eq!(forest.num_classes(), label + 1);
        }
    }
}
