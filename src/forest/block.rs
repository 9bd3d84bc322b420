//! Axis-aligned bounding box of the samples routed through a node.

use nalgebra::DVector;

/// Bounding hyperrectangle of a Mondrian node. A fresh block starts with
/// `min = +inf`, `max = -inf`, so the first point that passes through sets
/// exact coordinates.
#[derive(Clone, Debug)]
pub struct MondrianBlock {
    min: DVector<f32>,
    max: DVector<f32>,
}

impl MondrianBlock {
    pub fn new(feature_dim: usize) -> Self {
        Self {
            min: DVector::from_element(feature_dim, f32::INFINITY),
            max: DVector::from_element(feature_dim, f32::NEG_INFINITY),
        }
    }

    pub fn from_bounds(min: DVector<f32>, max: DVector<f32>) -> Self {
        Self { min, max }
    }

    /// A block that covers the single point `x`.
    pub fn degenerate(x: &DVector<f32>) -> Self {
        Self {
            min: x.clone(),
            max: x.clone(),
        }
    }

    pub fn min(&self) -> &DVector<f32> {
        &self.min
    }

    pub fn max(&self) -> &DVector<f32> {
        &self.max
    }

    pub fn feature_dim(&self) -> usize {
        self.min.len()
    }

    fn is_initialized(&self) -> bool {
        self.min[0].is_finite()
    }

    /// Componentwise min/max of the block bounds and a new point.
    pub fn range_with_point(&self, x: &DVector<f32>) -> (DVector<f32>, DVector<f32>) {
        (self.min.inf(x), self.max.sup(x))
    }

    /// Sum of the current dimension ranges; zero for an untouched block.
    pub fn sum_dim_range(&self) -> f32 {
        if self.is_initialized() {
            (&self.max - &self.min).sum()
        } else {
            0.0
        }
    }

    /// Grows the bounds in place to cover `x`.
    pub fn extend_to(&mut self, x: &DVector<f32>) {
        self.min = self.min.inf(x);
        self.max = self.max.sup(x);
    }

    /// Componentwise distance by which `x` escapes the block below the lower
    /// bound, `max(0, min - x)`.
    pub fn escape_lower(&self, x: &DVector<f32>) -> DVector<f32> {
        (&self.min - x).sup(&DVector::zeros(x.len()))
    }

    /// Componentwise distance by which `x` escapes the block above the upper
    /// bound, `max(0, x - max)`.
    pub fn escape_upper(&self, x: &DVector<f32>) -> DVector<f32> {
        (x - &self.max).sup(&DVector::zeros(x.len()))
    }

    /// Total linear escape distance of `x` from the block.
    pub fn escape_distance(&self, x: &DVector<f32>) -> f32 {
        self.escape_lower(x).sum() + self.escape_upper(x).sum()
    }

    /// Euclidean escape distance, split into the lower and upper excursions.
    pub fn euclidean_escape_distance(&self, x: &DVector<f32>) -> f32 {
        self.escape_upper(x).norm() + self.escape_lower(x).norm()
    }
}
