//! Trained model representation.

mod forest;
mod tree;

pub use forest::Forest;
pub use tree::{Tree, TreeValidationError};
