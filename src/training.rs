//! Histogram-based least-squares boosting.
//!
//! Residual fitting with depth-wise greedy growth: every candidate split is
//! scored from per-bucket gradient histograms over the dataset's bucketized
//! columns, and the emitted trees carry the raw cut values as thresholds so
//! prediction runs on unbucketized rows. Per-feature split gain accumulates
//! into the feature-importance vector.

use crate::config::Config;
use crate::data::Dataset;
use crate::model::{Forest, Tree};

/// Splits with gain at or below this are not worth a node.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TrainError {
    #[error("dataset must be closed before training")]
    DatasetNotClosed,

    #[error("dataset holds no training examples")]
    EmptyDataset,
}

/// A trained ensemble plus its per-feature importance scores.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub forest: Forest,
    /// Total split gain attributed to each feature.
    pub importance: Vec<f64>,
}

/// Train a boosted ensemble on a closed dataset.
///
/// The first tree in the returned forest is a single leaf holding the target
/// mean; `config.num_trees` grown trees follow it.
pub fn train(dataset: &Dataset, config: &Config) -> Result<TrainedModel, TrainError> {
    if !dataset.is_closed() {
        return Err(TrainError::DatasetNotClosed);
    }
    let n_rows = dataset.n_examples();
    if n_rows == 0 {
        return Err(TrainError::EmptyDataset);
    }

    let targets = dataset.targets();
    let base_score = targets.iter().sum::<f64>() / n_rows as f64;

    let mut forest = Forest::new();
    forest.push_tree(Tree::single_leaf(base_score));

    let mut predictions = vec![base_score; n_rows];
    let mut residuals = vec![0.0; n_rows];
    let mut importance = vec![0.0; dataset.n_features()];

    for round in 0..config.num_trees {
        for (r, (&target, &pred)) in targets.iter().zip(&predictions).enumerate() {
            residuals[r] = target - pred;
        }

        let grower = TreeGrower {
            dataset,
            residuals: &residuals,
            predictions: &mut predictions,
            importance: &mut importance,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            min_node_examples: config.min_node_examples,
            tree: Tree::new(),
        };
        let tree = grower.grow();
        tracing::debug!(round, n_nodes = tree.n_nodes(), "grew tree");
        forest.push_tree(tree);
    }

    Ok(TrainedModel { forest, importance })
}

// =============================================================================
// Tree growing
// =============================================================================

struct SplitCandidate {
    feature: usize,
    /// Rows with `bin <= split bin` go left.
    bin: usize,
    gain: f64,
}

struct TreeGrower<'a> {
    dataset: &'a Dataset,
    residuals: &'a [f64],
    predictions: &'a mut [f64],
    importance: &'a mut [f64],
    learning_rate: f64,
    max_depth: usize,
    min_node_examples: usize,
    tree: Tree,
}

impl TreeGrower<'_> {
    fn grow(mut self) -> Tree {
        let rows: Vec<u32> = (0..self.dataset.n_examples() as u32).collect();
        self.grow_node(&rows, 0);
        self.tree
    }

    /// Grow the subtree for `rows`, returning its root node id. Nodes are
    /// pushed parent-first, so children always point forward.
    fn grow_node(&mut self, rows: &[u32], depth: usize) -> u32 {
        if depth >= self.max_depth || rows.len() < 2 * self.min_node_examples {
            return self.emit_leaf(rows);
        }
        let Some(split) = self.best_split(rows) else {
            return self.emit_leaf(rows);
        };

        self.importance[split.feature] += split.gain;
        let column = self.dataset.column(split.feature);
        let node = self
            .tree
            .push_split(split.feature as u32, column.cut(split.bin));

        // Stable partition keeps row order deterministic within each side.
        let bins = column.bins();
        let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = rows
            .iter()
            .partition(|&&r| (bins[r as usize] as usize) <= split.bin);

        let left = self.grow_node(&left_rows, depth + 1);
        let right = self.grow_node(&right_rows, depth + 1);
        self.tree.set_children(node, left, right);
        node
    }

    fn emit_leaf(&mut self, rows: &[u32]) -> u32 {
        debug_assert!(!rows.is_empty(), "leaf over zero rows");
        let sum: f64 = rows.iter().map(|&r| self.residuals[r as usize]).sum();
        let value = self.learning_rate * sum / rows.len() as f64;
        for &r in rows {
            self.predictions[r as usize] += value;
        }
        self.tree.push_leaf(value)
    }

    /// Best split over all features, scored as the squared-error decrease
    /// `GL²/nL + GR²/nR - GP²/nP` from per-bucket gradient histograms.
    fn best_split(&self, rows: &[u32]) -> Option<SplitCandidate> {
        let total_n = rows.len();
        let total_sum: f64 = rows.iter().map(|&r| self.residuals[r as usize]).sum();
        let parent_score = total_sum * total_sum / total_n as f64;

        let mut best: Option<SplitCandidate> = None;
        for feature in 0..self.dataset.n_features() {
            let column = self.dataset.column(feature);
            let n_bins = column.n_bins();
            if n_bins < 2 {
                continue; // constant feature
            }

            let mut hist_sum = vec![0.0f64; n_bins];
            let mut hist_n = vec![0u32; n_bins];
            let bins = column.bins();
            for &r in rows {
                let b = bins[r as usize] as usize;
                hist_sum[b] += self.residuals[r as usize];
                hist_n[b] += 1;
            }

            let mut left_sum = 0.0;
            let mut left_n = 0usize;
            for bin in 0..n_bins - 1 {
                left_sum += hist_sum[bin];
                left_n += hist_n[bin] as usize;
                let right_n = total_n - left_n;
                if left_n < self.min_node_examples || right_n < self.min_node_examples {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let gain = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64
                    - parent_score;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}
