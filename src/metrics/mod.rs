//! Functions for evaluating classification performance.
pub mod confusion;

pub use confusion::{ClassificationMetrics, LabelValue};
