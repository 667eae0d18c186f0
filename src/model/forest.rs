//! The trained ensemble: an ordered sequence of trees.

use serde::{Deserialize, Serialize};

use super::Tree;

/// Ordered tree ensemble.
///
/// Prediction sums every tree's contribution; a trainer encodes the base
/// score as a leading single-leaf tree, so the prefix of size 1 is already
/// the baseline predictor. Serializes as the model document: a single
/// `trees` field holding the per-tree sub-documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new() -> Self {
        Self { trees: Vec::new() }
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Keep only the first `n_trees` trees.
    pub fn truncate(&mut self, n_trees: usize) {
        self.trees.truncate(n_trees);
    }

    /// Full-ensemble prediction for one row.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|tree| tree.predict_row(features))
            .sum()
    }

    /// Fill `out` with the prefix predictions `f_1 .. f_N` for one row.
    ///
    /// `out[k-1]` is the prediction of the first `k` trees; each entry costs
    /// one extra tree traversal over the previous, not a recomputation, so
    /// the whole vector is a single pass. `out` is cleared first and ends up
    /// with [`n_trees`](Forest::n_trees) entries.
    pub fn predict_prefixes_into(&self, features: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.reserve(self.trees.len());
        let mut partial = 0.0;
        for tree in &self.trees {
            partial += tree.predict_row(features);
            out.push(partial);
        }
    }
}
