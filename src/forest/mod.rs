//! The Mondrian forest core: blocks, nodes, trees and the forest aggregator.
pub mod block;
pub mod classifier;
pub mod node;
pub mod settings;
pub mod tree;

pub use classifier::{MondrianForest, NO_DECISION};
pub use node::ConfidenceState;
pub use settings::MondrianSettings;
pub use tree::MondrianTree;
