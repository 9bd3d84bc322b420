//! # Mondrian forest
//!
//! `mondrian-forest` is a streaming, non-parametric classifier: a forest of
//! Mondrian trees that grow their partition of feature space one sample at a
//! time and can selectively query labels based on prediction confidence
//! (stream-based active learning).
//!
//! ## Example Usage
//!
//! Train a small forest online and classify a point:
//!
//! ```rust
//! use mondrian_forest::data::Sample;
//! use mondrian_forest::forest::{MondrianForest, MondrianSettings};
//! use nalgebra::DVector;
//!
//! let mut settings = MondrianSettings::new();
//! settings.set_num_trees(5).unwrap();
//! let mut forest = MondrianForest::new(settings, 1, Some(42));
//!
//! for i in 0..100 {
//!     let x = (i % 10) as f32 / 10.0;
//!     let sample = Sample {
//!         x: DVector::from_vec(vec![x]),
//!         y: usize::from(x > 0.5),
//!     };
//!     forest.update(&sample).unwrap();
//! }
//!
//! let query = Sample {
//!     x: DVector::from_vec(vec![0.1]),
//!     y: 0,
//! };
//! let (pred_class, confidence) = forest.classify_confident(&query);
//! assert_eq!(pred_class, 0);
//! assert!(confidence > 0.0);
//! ```

/// Run configuration
pub mod config;
/// Dataset and sample-stream utilities
pub mod data;
/// Training and evaluation driver
pub mod experiment;
/// The Mondrian forest core
pub mod forest;
/// Functions for evaluating classification performance
pub mod metrics;
/// Seedable random source
pub mod rng;
