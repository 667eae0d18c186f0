//! Regression tree storage (SoA) with raw-valued numeric splits.

use serde::{Deserialize, Serialize};

/// Structural problems detected when loading a tree from a model file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    Empty,

    #[error("node arrays have inconsistent lengths")]
    LengthMismatch,

    #[error("node {node} child index {child} out of range ({n_nodes} nodes)")]
    ChildOutOfRange {
        node: usize,
        child: u32,
        n_nodes: usize,
    },

    #[error("node {node} points back at an ancestor or itself")]
    ChildNotForward { node: usize },

    #[error("node {node} splits on feature {feature} outside schema width {n_features}")]
    SplitFeatureOutOfRange {
        node: usize,
        feature: u32,
        n_features: usize,
    },
}

/// A single regression tree in structure-of-arrays layout.
///
/// Split nodes route a row left when `features[split_feature] <= threshold`,
/// right otherwise; leaves carry the additive contribution. Node 0 is the
/// root. The JSON shape of this struct is the per-tree sub-document of the
/// model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    split_feature: Vec<u32>,
    threshold: Vec<f64>,
    left: Vec<u32>,
    right: Vec<u32>,
    value: Vec<f64>,
    leaf: Vec<bool>,
}

impl Tree {
    /// Create an empty tree. Nodes are appended with [`push_leaf`] and
    /// [`push_split`]; the first node pushed becomes the root.
    ///
    /// [`push_leaf`]: Tree::push_leaf
    /// [`push_split`]: Tree::push_split
    pub fn new() -> Self {
        Self {
            split_feature: Vec::new(),
            threshold: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            value: Vec::new(),
            leaf: Vec::new(),
        }
    }

    /// A tree consisting of a single leaf. Used for the base-score tree a
    /// trainer emits first.
    pub fn single_leaf(value: f64) -> Self {
        let mut tree = Self::new();
        tree.push_leaf(value);
        tree
    }

    /// Append a leaf node, returning its id.
    pub fn push_leaf(&mut self, value: f64) -> u32 {
        self.push_node(0, 0.0, value, true)
    }

    /// Append a split node with children unset, returning its id.
    /// Call [`set_children`](Tree::set_children) once both subtrees exist.
    pub fn push_split(&mut self, feature: u32, threshold: f64) -> u32 {
        self.push_node(feature, threshold, 0.0, false)
    }

    fn push_node(&mut self, feature: u32, threshold: f64, value: f64, is_leaf: bool) -> u32 {
        let id = self.split_feature.len() as u32;
        self.split_feature.push(feature);
        self.threshold.push(threshold);
        self.left.push(0);
        self.right.push(0);
        self.value.push(value);
        self.leaf.push(is_leaf);
        id
    }

    /// Wire up the children of a split node.
    pub fn set_children(&mut self, node: u32, left: u32, right: u32) {
        debug_assert!(!self.leaf[node as usize], "leaves have no children");
        self.left[node as usize] = left;
        self.right[node as usize] = right;
    }

    pub fn n_nodes(&self) -> usize {
        self.split_feature.len()
    }

    pub fn is_leaf(&self, node: u32) -> bool {
        self.leaf[node as usize]
    }

    pub fn leaf_value(&self, node: u32) -> f64 {
        self.value[node as usize]
    }

    pub fn split_feature(&self, node: u32) -> u32 {
        self.split_feature[node as usize]
    }

    pub fn threshold(&self, node: u32) -> f64 {
        self.threshold[node as usize]
    }

    /// Route a row from the root to a leaf and return its value.
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        let mut node = 0u32;
        loop {
            if self.leaf[node as usize] {
                return self.value[node as usize];
            }
            let feature = self.split_feature[node as usize] as usize;
            node = if features[feature] <= self.threshold[node as usize] {
                self.left[node as usize]
            } else {
                self.right[node as usize]
            };
        }
    }

    /// Structural validation for trees read from disk.
    ///
    /// Children must exist and point strictly forward, which also rules out
    /// traversal cycles; split features must fit inside the schema width
    /// `n_features`, otherwise prediction would index past the row.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::Empty);
        }
        let all = [
            self.threshold.len(),
            self.left.len(),
            self.right.len(),
            self.value.len(),
            self.leaf.len(),
        ];
        if all.iter().any(|&len| len != n_nodes) {
            return Err(TreeValidationError::LengthMismatch);
        }

        for node in 0..n_nodes {
            if self.leaf[node] {
                continue;
            }
            let feature = self.split_feature[node];
            if feature as usize >= n_features {
                return Err(TreeValidationError::SplitFeatureOutOfRange {
                    node,
                    feature,
                    n_features,
                });
            }
            for child in [self.left[node], self.right[node]] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfRange {
                        node,
                        child,
                        n_nodes,
                    });
                }
                if child as usize <= node {
                    return Err(TreeValidationError::ChildNotForward { node });
                }
            }
        }
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// depth-1 stump: x0 <= threshold ? left_val : right_val
    pub(crate) fn stump(feature: u32, threshold: f64, left_val: f64, right_val: f64) -> Tree {
        let mut tree = Tree::new();
        let root = tree.push_split(feature, threshold);
        let left = tree.push_leaf(left_val);
        let right = tree.push_leaf(right_val);
        tree.set_children(root, left, right);
        tree
    }

    #[test]
    fn single_leaf_predicts_constant() {
        let tree = Tree::single_leaf(3.25);
        assert_eq!(tree.predict_row(&[0.0, 1.0]), 3.25);
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn stump_routes_on_threshold() {
        let tree = stump(1, 0.5, -1.0, 2.0);
        assert_eq!(tree.predict_row(&[9.0, 0.5]), -1.0); // boundary goes left
        assert_eq!(tree.predict_row(&[9.0, 0.51]), 2.0);
    }

    #[test]
    fn deeper_tree_routes_both_levels() {
        let mut tree = Tree::new();
        let root = tree.push_split(0, 0.0);
        let inner = tree.push_split(1, 10.0);
        let a = tree.push_leaf(1.0);
        let b = tree.push_leaf(2.0);
        tree.set_children(inner, a, b);
        let c = tree.push_leaf(3.0);
        tree.set_children(root, inner, c);

        assert_eq!(tree.predict_row(&[-1.0, 5.0]), 1.0);
        assert_eq!(tree.predict_row(&[-1.0, 15.0]), 2.0);
        assert_eq!(tree.predict_row(&[1.0, 0.0]), 3.0);
        tree.validate(2).unwrap();
    }

    #[test]
    fn validate_rejects_empty_tree() {
        assert!(matches!(
            Tree::new().validate(1),
            Err(TreeValidationError::Empty)
        ));
    }

    #[test]
    fn validate_rejects_dangling_child() {
        let mut tree = Tree::new();
        let root = tree.push_split(0, 0.0);
        let left = tree.push_leaf(1.0);
        tree.set_children(root, left, 42);
        assert!(matches!(
            tree.validate(1),
            Err(TreeValidationError::ChildOutOfRange { .. })
        ));
    }

    #[test]
    fn validate_rejects_backward_child() {
        let mut tree = Tree::new();
        let root = tree.push_split(0, 0.0);
        let left = tree.push_leaf(1.0);
        tree.set_children(root, left, root);
        assert!(matches!(
            tree.validate(1),
            Err(TreeValidationError::ChildNotForward { .. })
        ));
    }

    #[test]
    fn validate_rejects_split_feature_beyond_width() {
        let tree = stump(5, 1.0, -1.0, 1.0);
        tree.validate(6).unwrap();
        assert!(matches!(
            tree.validate(1),
            Err(TreeValidationError::SplitFeatureOutOfRange {
                node: 0,
                feature: 5,
                n_features: 1,
            })
        ));
    }

    #[test]
    fn json_round_trip() {
        let tree = stump(0, 1.5, -0.25, 0.75);
        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
