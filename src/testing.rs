//! Synthetic data helpers shared by tests.

use rand::prelude::*;

/// Random dense features in row-major order, uniform in `[min, max]`.
pub fn random_dense_f64(rows: usize, cols: usize, seed: u64, min: f64, max: f64) -> Vec<f64> {
    assert!(max >= min);
    let mut rng = StdRng::seed_from_u64(seed);
    let width = max - min;
    (0..rows * cols).map(|_| min + rng.gen::<f64>() * width).collect()
}

/// Regression targets from a linear model of the features plus uniform noise.
///
/// Returns `(targets, weights, bias)`.
pub fn synthetic_regression_targets_linear(
    features_row_major: &[f64],
    rows: usize,
    cols: usize,
    seed: u64,
    noise_amplitude: f64,
) -> (Vec<f64>, Vec<f64>, f64) {
    assert_eq!(features_row_major.len(), rows * cols);
    let mut rng = StdRng::seed_from_u64(seed);

    let weights: Vec<f64> = (0..cols).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let bias: f64 = rng.gen::<f64>() * 0.5 - 0.25;

    let mut targets = Vec::with_capacity(rows);
    for r in 0..rows {
        let mut y = bias;
        let base = r * cols;
        for c in 0..cols {
            y += features_row_major[base + c] * weights[c];
        }
        if noise_amplitude > 0.0 {
            y += (rng.gen::<f64>() * 2.0 - 1.0) * noise_amplitude;
        }
        targets.push(y);
    }

    (targets, weights, bias)
}

/// Format rows as input text: target first, then the features, tab separated.
pub fn data_lines(features_row_major: &[f64], targets: &[f64], cols: usize) -> String {
    let mut out = String::new();
    for (r, &target) in targets.iter().enumerate() {
        out.push_str(&target.to_string());
        for c in 0..cols {
            out.push('\t');
            out.push_str(&features_row_major[r * cols + c].to_string());
        }
        out.push('\n');
    }
    out
}

/// Like [`data_lines`] but with a trailing logged-score column per row.
pub fn data_lines_with_scores(
    features_row_major: &[f64],
    targets: &[f64],
    scores: &[f64],
    cols: usize,
) -> String {
    let mut out = String::new();
    for (r, (&target, &score)) in targets.iter().zip(scores).enumerate() {
        out.push_str(&target.to_string());
        for c in 0..cols {
            out.push('\t');
            out.push_str(&features_row_major[r * cols + c].to_string());
        }
        out.push('\t');
        out.push_str(&score.to_string());
        out.push('\n');
    }
    out
}
