//! Mondrian node: one region of the partition.
//!
//! A node owns its bounding block, the class histogram of every sample routed
//! through it, and, when internal, the split plus the Beta decision
//! distribution used for density estimation. Children are owned by their
//! parent; operations that can replace a subtree root (an outer split pushes
//! a new ancestor above the node) take the node by value and hand the new
//! root back up.

use nalgebra::DVector;

use super::block::MondrianBlock;
use super::settings::MondrianSettings;
use crate::rng::RandomSource;

/// Per-query state filled in at the leaf that finally absorbs the query
/// point, consumed by the forest's confidence score.
#[derive(Clone, Debug, Default)]
pub struct ConfidenceState {
    /// Euclidean distance by which the query escapes the leaf's block.
    pub distance: f32,
    /// Number of samples at the leaf's parent.
    pub number_of_points: u32,
    /// Leaf probability mass relative to the heaviest leaf of the tree.
    pub normalized_density: f32,
}

pub struct MondrianNode {
    pub(crate) block: MondrianBlock,
    pub(crate) counts: DVector<u32>,
    pub(crate) data_counter: u32,
    pub(crate) split_dim: usize,
    pub(crate) split_loc: f32,
    pub(crate) budget: f32,
    pub(crate) max_split_cost: f32,
    pub(crate) depth: u32,
    pub(crate) alpha: f32,
    pub(crate) beta: f32,
    pub(crate) expected_prob_mass: f32,
    pub(crate) left: Option<Box<MondrianNode>>,
    pub(crate) right: Option<Box<MondrianNode>>,
}

impl MondrianNode {
    pub(crate) fn new_leaf(
        feature_dim: usize,
        num_classes: usize,
        budget: f32,
        depth: u32,
    ) -> Self {
        Self::with_block(MondrianBlock::new(feature_dim), num_classes, budget, depth)
    }

    fn with_block(block: MondrianBlock, num_classes: usize, budget: f32, depth: u32) -> Self {
        Self {
            block,
            counts: DVector::zeros(num_classes),
            data_counter: 0,
            split_dim: 0,
            split_loc: 0.0,
            budget,
            max_split_cost: budget,
            depth,
            alpha: 0.0,
            beta: 0.0,
            expected_prob_mass: 0.0,
            left: None,
            right: None,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    /// Lengthens the class histogram of this node and every descendant to
    /// `num_classes`, zero-filling the new entries.
    pub(crate) fn add_new_class(&mut self, num_classes: usize) {
        let counts = std::mem::replace(&mut self.counts, DVector::zeros(0));
        self.counts = counts.resize_vertically(num_classes, 0);
        if let Some(left) = self.left.as_mut() {
            left.add_new_class(num_classes);
        }
        if let Some(right) = self.right.as_mut() {
            right.add_new_class(num_classes);
        }
    }

    pub(crate) fn add_point(&mut self, label: usize) {
        debug_assert!(label < self.counts.len());
        self.data_counter += 1;
        self.counts[label] += 1;
    }

    fn copy_histogram(&mut self, source: &MondrianNode) {
        self.counts = source.counts.clone();
        self.data_counter = source.data_counter;
    }

    /// True when at most one class has been seen beneath this node.
    fn same_labels(&self) -> bool {
        let nonzero = self.counts.iter().filter(|&&count| count > 0).count();
        nonzero == 1 || self.counts.len() <= 1
    }

    /// Like [`same_labels`](Self::same_labels), but also requires the
    /// incoming label to match the single class seen so far.
    fn same_labels_with(&self, label: usize) -> bool {
        let nonzero = self.counts.iter().filter(|&&count| count > 0).count();
        match nonzero {
            0 => true,
            1 => self.counts.len() <= 1 || self.counts[label] > 0,
            _ => false,
        }
    }

    /// A paused node stops splitting while its samples share a label. The
    /// `max_samples_in_one_node` setting forces a paused node back into play
    /// once it has absorbed that many samples.
    fn is_paused(&self, settings: &MondrianSettings) -> bool {
        if settings.max_samples_in_one_node > 0
            && self.data_counter > settings.max_samples_in_one_node
        {
            return false;
        }
        self.same_labels()
    }

    /// Beta pseudo-counts for a fresh split, proportional to the linear
    /// volumes of the two halves of the block and growing with depth.
    fn decision_prior(
        min: &DVector<f32>,
        max: &DVector<f32>,
        split_dim: usize,
        split_loc: f32,
        depth: u32,
        hyperparam: f32,
    ) -> (f32, f32) {
        let mut min_at_split = min.clone();
        min_at_split[split_dim] = split_loc;
        let volume_right = (max - &min_at_split).sum();
        let mut max_at_split = max.clone();
        max_at_split[split_dim] = split_loc;
        let volume_left = (&max_at_split - min).sum();
        let total = volume_left + volume_right;
        debug_assert!(total > 0.0);
        let scale = hyperparam * ((depth + 1) as f32).powi(2);
        (scale * volume_right / total, scale * volume_left / total)
    }

    /// Bounding block of one side of the split, spanned by whichever of the
    /// new point and the old block corners fall on that side.
    fn half_bounds(&self, x: &DVector<f32>, left_side: bool) -> MondrianBlock {
        let candidates = [x, self.block.min(), self.block.max()];
        let mut bounds: Option<(DVector<f32>, DVector<f32>)> = None;
        for point in candidates {
            let keep = if left_side {
                point[self.split_dim] <= self.split_loc
            } else {
                point[self.split_dim] > self.split_loc
            };
            if !keep {
                continue;
            }
            bounds = Some(match bounds {
                None => (point.clone(), point.clone()),
                Some((min, max)) => (min.inf(point), max.sup(point)),
            });
        }
        match bounds {
            Some((min, max)) => MondrianBlock::from_bounds(min, max),
            // A split location drawn exactly on the boundary leaves one side
            // without corners; the query point is the only anchor left.
            None => MondrianBlock::degenerate(x),
        }
    }

    /// Draws a split cost for this node against its block extended with `x`
    /// and, if the budget allows, turns the leaf into an internal node with
    /// two fresh children, recursing into the side that holds `x`.
    ///
    /// `carve_new_leaf` restricts histogram inheritance: the child on the
    /// sample's side starts from an empty histogram instead of a copy of this
    /// node's, used when the sample is being carved out of a degenerate
    /// block.
    pub(crate) fn sample_block(
        &mut self,
        x: &DVector<f32>,
        label: usize,
        carve_new_leaf: bool,
        settings: &MondrianSettings,
        rng: &mut RandomSource,
    ) -> Result<(), String> {
        let (min_ext, max_ext) = self.block.range_with_point(x);
        let dim_range = (&max_ext - &min_ext).sum();
        debug_assert!(dim_range >= 0.0);

        let split_cost;
        if self.same_labels_with(label) || dim_range == 0.0 {
            split_cost = f32::INFINITY;
            self.max_split_cost = self.budget;
        } else {
            split_cost = rng.exponential(dim_range);
            self.max_split_cost = split_cost;
        }
        let carve = carve_new_leaf || self.block.sum_dim_range() == 0.0;
        let new_budget = (self.budget - split_cost).max(0.0);

        if self.budget > split_cost {
            debug_assert!(self.is_leaf());
            let widths = &max_ext - &min_ext;
            self.split_dim = rng.categorical(&widths)?;
            self.split_loc = rng.uniform_range(min_ext[self.split_dim], max_ext[self.split_dim]);
            let (alpha, beta) = Self::decision_prior(
                &min_ext,
                &max_ext,
                self.split_dim,
                self.split_loc,
                self.depth,
                settings.decision_prior_hyperparam,
            );
            self.alpha = alpha;
            self.beta = beta;

            let num_classes = self.counts.len();
            let mut left = Box::new(Self::with_block(
                self.half_bounds(x, true),
                num_classes,
                new_budget,
                self.depth + 1,
            ));
            let mut right = Box::new(Self::with_block(
                self.half_bounds(x, false),
                num_classes,
                new_budget,
                self.depth + 1,
            ));

            let goes_right = x[self.split_dim] > self.split_loc;
            if carve {
                if goes_right {
                    left.copy_histogram(self);
                } else {
                    right.copy_histogram(self);
                }
            } else {
                left.copy_histogram(self);
                right.copy_histogram(self);
            }
            {
                let child = if goes_right { &mut right } else { &mut left };
                child.sample_block(x, label, true, settings, rng)?;
                child.add_point(label);
            }
            self.left = Some(left);
            self.right = Some(right);
        }
        Ok(())
    }

    /// Streaming insert. Either the sample is absorbed into this subtree
    /// (block extension, histogram update, recursion), or an outer split
    /// fits the budget and a new ancestor is created above this node with a
    /// fresh sibling leaf at `x`. Returns the (possibly new) subtree root.
    pub(crate) fn extend(
        mut self: Box<Self>,
        x: &DVector<f32>,
        label: usize,
        settings: &MondrianSettings,
        rng: &mut RandomSource,
    ) -> Result<Box<MondrianNode>, String> {
        let e_lower = self.block.escape_lower(x);
        let e_upper = self.block.escape_upper(x);
        let eta = e_lower.sum() + e_upper.sum();
        let mut split_cost = if eta <= 0.0 {
            f32::INFINITY
        } else {
            rng.exponential(eta)
        };
        if self.is_paused(settings) {
            debug_assert!(self.is_leaf());
            split_cost = f32::INFINITY;
        }

        if split_cost >= self.max_split_cost {
            // Not enough budget for an outer split: the sample is absorbed
            // here.
            if self.is_leaf() {
                if !self.same_labels_with(label) {
                    self.sample_block(x, label, false, settings, rng)?;
                }
                // The block is extended after sampling so the new children
                // are anchored on the pre-extension corners.
                self.block.extend_to(x);
                self.add_point(label);
            } else {
                self.block.extend_to(x);
                self.add_point(label);
                let goes_left = x[self.split_dim] <= self.split_loc;
                if goes_left {
                    self.beta += 1.0;
                } else {
                    self.alpha += 1.0;
                }
                let slot = if goes_left {
                    &mut self.left
                } else {
                    &mut self.right
                };
                if let Some(child) = slot.take() {
                    *slot = Some(child.extend(x, label, settings, rng)?);
                }
            }
            Ok(self)
        } else {
            // The outer split fits: insert a new ancestor between this node
            // and its parent, with a fresh sibling leaf at the sample.
            let min_ext = self.block.min().inf(x);
            let max_ext = self.block.max().sup(x);
            let feature_dim = self.block.feature_dim();

            let feat_score = &e_lower + &e_upper;
            let mut split_dim = rng.categorical(&feat_score)?;
            for _ in 0..feature_dim {
                if min_ext[split_dim] == max_ext[split_dim] {
                    split_dim = rng.categorical(&min_ext)?;
                } else {
                    break;
                }
            }
            let split_loc = if x[split_dim] > self.block.max()[split_dim] {
                rng.uniform_range(self.block.max()[split_dim], x[split_dim])
            } else {
                rng.uniform_range(x[split_dim], self.block.min()[split_dim])
            };

            let new_budget = self.budget - split_cost;
            let parent_depth = self.depth;
            let num_classes = self.counts.len();

            let mut sibling = Self::with_block(
                MondrianBlock::degenerate(x),
                num_classes,
                new_budget,
                parent_depth + 1,
            );
            sibling.add_point(label);
            sibling.sample_block(x, label, false, settings, rng)?;

            let mut parent = Self::with_block(
                MondrianBlock::from_bounds(min_ext.clone(), max_ext.clone()),
                num_classes,
                self.budget,
                parent_depth,
            );
            parent.copy_histogram(&self);
            parent.add_point(label);
            parent.split_dim = split_dim;
            parent.split_loc = split_loc;
            parent.max_split_cost = split_cost;
            let (alpha, beta) = Self::decision_prior(
                &min_ext,
                &max_ext,
                split_dim,
                split_loc,
                parent_depth,
                settings.decision_prior_hyperparam,
            );
            parent.alpha = alpha;
            parent.beta = beta;

            self.budget = new_budget;
            self.max_split_cost -= split_cost;
            self.bump_depth();

            if x[split_dim] > split_loc {
                parent.left = Some(self);
                parent.right = Some(Box::new(sibling));
            } else {
                parent.left = Some(Box::new(sibling));
                parent.right = Some(self);
            }
            Ok(Box::new(parent))
        }
    }

    fn bump_depth(&mut self) {
        self.depth += 1;
        if let Some(left) = self.left.as_mut() {
            left.bump_depth();
        }
        if let Some(right) = self.right.as_mut() {
            right.bump_depth();
        }
    }

    /// Recursive classification with interpolated Kneser-Ney smoothing.
    ///
    /// `base` is the posterior of the parent (uniform at the root) and acts
    /// as the prior mean at this node. `prob_not_separated_yet` carries the
    /// probability that the query has not branched off above this node;
    /// every traversed node adds its separated share to `pred_prob`, and a
    /// leaf that contains the query adds the remaining mass.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn classify(
        &self,
        x: &DVector<f32>,
        base: &DVector<f32>,
        discount_rate: f32,
        pred_prob: &mut DVector<f32>,
        prob_not_separated_yet: &mut f32,
        parent_points: Option<u32>,
        max_leaf_mass: f32,
        conf: &mut ConfidenceState,
    ) {
        let eta = self.block.escape_distance(x);
        if self.is_leaf() {
            conf.distance = self.block.euclidean_escape_distance(x);
            conf.number_of_points = parent_points.unwrap_or(self.data_counter);
            conf.normalized_density = if max_leaf_mass > 0.0 {
                self.expected_prob_mass / max_leaf_mass
            } else {
                0.0
            };
        }

        // NaN when eta = 0 and the node is paused (0 * inf); the guard below
        // treats that the same as "cannot separate here".
        let eta_cost = eta * self.max_split_cost;

        // Tables vs. customers: leaves count every sample, internal nodes
        // count each class at most once.
        let cnt = if self.is_leaf() {
            self.counts.map(|count| count as f32)
        } else {
            self.counts.map(|count| count.min(1) as f32)
        };
        let tables_k = cnt.map(|count| count.min(1.0));
        let num_customers = cnt.sum();
        let num_tables = tables_k.sum();

        // Expected discount, averaging over the time of cut, which is a
        // truncated exponential whenever the query can separate here.
        let discount = if eta_cost > 0.0 {
            (eta / (eta + discount_rate))
                * (-((-(eta + discount_rate) * self.max_split_cost).exp_m1()))
                / (-((-eta_cost).exp_m1()))
        } else if self.max_split_cost.is_finite() {
            (-discount_rate * self.max_split_cost).exp()
        } else {
            0.0
        };

        let posterior = if num_customers > 0.0 {
            (cnt - &tables_k * discount + base * (discount * num_tables)) / num_customers
        } else {
            base.clone()
        };

        if eta_cost > 0.0 {
            let prob_not_separated_now = (-eta_cost).exp();
            let prob_separated_now = 1.0 - prob_not_separated_now;
            *pred_prob += &posterior * (prob_separated_now * *prob_not_separated_yet);
            *prob_not_separated_yet *= prob_not_separated_now;
            debug_assert!(pred_prob.iter().all(|p| p == p));
        }

        if let (Some(left), Some(right)) = (self.left.as_ref(), self.right.as_ref()) {
            let child = if x[self.split_dim] <= self.split_loc {
                left
            } else {
                right
            };
            child.classify(
                x,
                &posterior,
                discount_rate,
                pred_prob,
                prob_not_separated_yet,
                Some(self.data_counter),
                max_leaf_mass,
                conf,
            );
        } else if eta <= 0.0 {
            *pred_prob += &posterior * *prob_not_separated_yet;
        }
    }

    /// Recomputes the expected probability mass of this subtree given the
    /// mass arriving at it, tracking the heaviest leaf seen.
    pub(crate) fn refresh_expected_prob_mass(&mut self, mass: f32, max_leaf_mass: &mut f32) {
        self.expected_prob_mass = mass;
        let total = self.alpha + self.beta;
        if let Some(left) = self.left.as_mut() {
            left.refresh_expected_prob_mass(mass * self.beta / total, max_leaf_mass);
        }
        if let Some(right) = self.right.as_mut() {
            right.refresh_expected_prob_mass(mass * self.alpha / total, max_leaf_mass);
        } else if self.left.is_none() && mass > *max_leaf_mass {
            *max_leaf_mass = mass;
        }
    }
}
