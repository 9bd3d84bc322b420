//! Dataset loading and the sample stream consumed by the forest.
pub mod dataset;

pub use dataset::{Dataset, Sample};
