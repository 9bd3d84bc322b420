//! A single Mondrian tree.

use nalgebra::DVector;

use super::node::{ConfidenceState, MondrianNode};
use super::settings::MondrianSettings;
use crate::data::Sample;
use crate::rng::RandomSource;

/// One independently grown Mondrian tree. The tree owns its root, its own
/// random source and the bookkeeping shared by every node: the number of
/// classes discovered so far and the probability mass of the heaviest leaf,
/// which normalizes the density estimate during prediction.
pub struct MondrianTree {
    root: Option<Box<MondrianNode>>,
    num_classes: usize,
    data_counter: u32,
    max_leaf_mass: f32,
    feature_dim: usize,
    rng: RandomSource,
}

impl MondrianTree {
    pub fn new(feature_dim: usize, seed: u64) -> Self {
        Self {
            root: Some(Box::new(MondrianNode::new_leaf(
                feature_dim,
                0,
                f32::INFINITY,
                0,
            ))),
            num_classes: 0,
            data_counter: 0,
            max_leaf_mass: 0.0,
            feature_dim,
            rng: RandomSource::new(Some(seed)),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn data_counter(&self) -> u32 {
        self.data_counter
    }

    /// Trains the tree on one sample: grows the class histograms if the
    /// label is new, routes the sample into the partition and refreshes the
    /// expected probability masses.
    pub fn update(
        &mut self,
        sample: &Sample,
        settings: &MondrianSettings,
    ) -> Result<(), String> {
        if sample.y >= self.num_classes {
            self.num_classes = sample.y + 1;
            if let Some(root) = self.root.as_mut() {
                root.add_new_class(self.num_classes);
            }
        }
        self.data_counter += 1;

        let mut root = match self.root.take() {
            Some(root) => root,
            None => return Err("Tree has no root.".to_string()),
        };
        if self.data_counter == 1 {
            // First sample: anchor the root block and draw its split cost
            // directly instead of extending an empty partition.
            root.block.extend_to(&sample.x);
            root.sample_block(&sample.x, sample.y, false, settings, &mut self.rng)?;
            root.add_point(sample.y);
        } else {
            root = root.extend(&sample.x, sample.y, settings, &mut self.rng)?;
        }

        self.max_leaf_mass = 0.0;
        root.refresh_expected_prob_mass(1.0, &mut self.max_leaf_mass);
        self.root = Some(root);
        Ok(())
    }

    /// Smoothed posterior over the known classes plus the per-query
    /// confidence state gathered at the absorbing leaf.
    pub fn classify(
        &self,
        sample: &Sample,
        settings: &MondrianSettings,
    ) -> (DVector<f32>, ConfidenceState) {
        let mut pred_prob = DVector::zeros(self.num_classes);
        let mut conf = ConfidenceState::default();
        let root = match self.root.as_ref() {
            Some(root) => root,
            None => return (pred_prob, conf),
        };
        if self.num_classes == 0 {
            return (pred_prob, conf);
        }
        let base = DVector::from_element(self.num_classes, 1.0 / self.num_classes as f32);
        let mut prob_not_separated_yet = 1.0;
        root.classify(
            &sample.x,
            &base,
            settings.discount_param(self.feature_dim),
            &mut pred_prob,
            &mut prob_not_separated_yet,
            None,
            self.max_leaf_mass,
            &mut conf,
        );
        (pred_prob, conf)
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &MondrianNode {
        self.root.as_ref().expect("tree root")
    }
}
