//! Streaming evaluation of a trained ensemble.
//!
//! The [`Evaluator`] drives prediction and scoring over test data, one line
//! at a time, and optionally maintains one [`LossFunction`] accumulator per
//! ensemble prefix size so a loss-vs-tree-count curve falls out of a single
//! pass. The engine reports the curve; it does not pick a "best" size.

use std::fmt;
use std::io::BufRead;

use crate::data::RowSchema;
use crate::model::Forest;

/// Absolute tolerance for the logged-vs-computed score agreement check.
pub const SCORE_AGREEMENT_TOLERANCE: f64 = 1e-5;

/// Emit a progress observation every this many accumulated examples.
const PROGRESS_INTERVAL: u64 = 1000;

// =============================================================================
// Loss functions
// =============================================================================

/// Running loss/statistics state for one evaluation stream.
///
/// Statistics are monotone: nothing removes or corrects a prior
/// accumulation, and an accumulator is never reused across unrelated runs.
pub trait LossFunction {
    /// Fold one `(target, predicted)` pair into the running statistics.
    fn accumulate(&mut self, target: f64, predicted: f64);

    /// Number of examples accumulated so far.
    fn n_examples(&self) -> u64;

    /// Total accumulated loss.
    fn loss(&self) -> f64;

    /// Loss saved relative to the baseline predictor, as the fraction of
    /// baseline loss eliminated (1.0 is a perfect model, 0.0 matches the
    /// baseline).
    fn reduction(&self) -> f64;
}

/// Squared-error loss against a running-mean baseline.
#[derive(Debug, Clone, Default)]
pub struct LeastSquares {
    n: u64,
    sum_y: f64,
    sum_y2: f64,
    sum_sq_err: f64,
}

impl LeastSquares {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LossFunction for LeastSquares {
    fn accumulate(&mut self, target: f64, predicted: f64) {
        self.n += 1;
        self.sum_y += target;
        self.sum_y2 += target * target;
        let err = target - predicted;
        self.sum_sq_err += err * err;
    }

    fn n_examples(&self) -> u64 {
        self.n
    }

    fn loss(&self) -> f64 {
        self.sum_sq_err
    }

    fn reduction(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        // Baseline: predict the running target mean. Its loss is the total
        // squared deviation of the targets.
        let baseline = self.sum_y2 - self.sum_y * self.sum_y / self.n as f64;
        if baseline > 0.0 {
            1.0 - self.sum_sq_err / baseline
        } else {
            0.0
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Drives scoring of test data against a trained ensemble.
///
/// Single-threaded by design; only ingestion is parallelized. One evaluator
/// covers a whole evaluation run, which may span several test files: the
/// primary accumulator and, in optimal-tree-count mode, the per-prefix
/// accumulators are shared across every file in the run.
pub struct Evaluator<'a> {
    forest: &'a Forest,
    schema: RowSchema,
    primary: LeastSquares,
    /// One accumulator per ensemble prefix size, only in optimal-tree-count
    /// mode; dense prefix scoring is opt-in to keep the common case O(1)
    /// per example.
    prefix: Option<Vec<LeastSquares>>,
    prefix_scores: Vec<f64>,
    sum_y: f64,
    sum_y2: f64,
    agreement: u64,
    rows_dropped: u64,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator for one run. `track_prefixes` enables the
    /// loss-vs-ensemble-size curve.
    pub fn new(forest: &'a Forest, schema: RowSchema, track_prefixes: bool) -> Self {
        let prefix =
            track_prefixes.then(|| vec![LeastSquares::new(); forest.n_trees()]);
        Self {
            forest,
            schema,
            primary: LeastSquares::new(),
            prefix,
            prefix_scores: Vec::new(),
            sum_y: 0.0,
            sum_y2: 0.0,
            agreement: 0,
            rows_dropped: 0,
        }
    }

    /// Score every line of a test stream.
    pub fn score_reader<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        for line in reader.lines() {
            self.score_line(&line?);
        }
        Ok(())
    }

    /// Score a single test line. Malformed lines are dropped silently, as
    /// during ingestion.
    pub fn score_line(&mut self, line: &str) {
        let Some(row) = self.schema.parse_row(line) else {
            self.rows_dropped += 1;
            return;
        };

        self.sum_y += row.target;
        self.sum_y2 += row.target * row.target;

        let computed = match &mut self.prefix {
            Some(prefix) => {
                self.forest
                    .predict_prefixes_into(&row.features, &mut self.prefix_scores);
                for (fun, &score) in prefix.iter_mut().zip(&self.prefix_scores) {
                    fun.accumulate(row.target, score);
                }
                self.prefix_scores.last().copied().unwrap_or(0.0)
            }
            None => self.forest.predict(&row.features),
        };

        self.primary.accumulate(row.target, computed);

        if let Some(logged) = row.logged_score {
            if (logged - computed).abs() <= SCORE_AGREEMENT_TOLERANCE {
                self.agreement += 1;
            }
        }

        if self.primary.n_examples() % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                examples = self.primary.n_examples(),
                loss = self.primary.loss(),
                reduction = self.primary.reduction(),
                logged_score = row.logged_score,
                computed_score = computed,
                "evaluation progress"
            );
        }
    }

    /// Snapshot the run's aggregate statistics.
    pub fn report(&self) -> EvalReport {
        EvalReport {
            n_examples: self.primary.n_examples(),
            loss: self.primary.loss(),
            reduction: self.primary.reduction(),
            sum_y: self.sum_y,
            sum_y2: self.sum_y2,
            agreement: self.agreement,
            rows_dropped: self.rows_dropped,
            prefix_losses: self
                .prefix
                .as_ref()
                .map(|funs| funs.iter().map(LossFunction::loss).collect()),
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Aggregate statistics over an evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub n_examples: u64,
    pub loss: f64,
    pub reduction: f64,
    pub sum_y: f64,
    pub sum_y2: f64,
    /// Rows whose freshly computed score matched the logged one within
    /// [`SCORE_AGREEMENT_TOLERANCE`].
    pub agreement: u64,
    /// Malformed test lines dropped during the run.
    pub rows_dropped: u64,
    /// Loss per ensemble prefix size, present in optimal-tree-count mode.
    /// Interpreting the curve is left to the operator.
    pub prefix_losses: Option<Vec<f64>>,
}

impl EvalReport {
    pub fn avg_loss(&self) -> f64 {
        if self.n_examples == 0 {
            0.0
        } else {
            self.loss / self.n_examples as f64
        }
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix_losses) = &self.prefix_losses {
            write!(f, "Optimal num tree stats:\t{}", prefix_losses.len())?;
            for loss in prefix_losses {
                write!(f, "\t{loss}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Avg loss on test: {}", self.avg_loss())?;
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.n_examples, self.reduction, self.loss, self.sum_y, self.sum_y2, self.agreement
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tree;
    use approx::assert_abs_diff_eq;

    #[test]
    fn least_squares_scenario() {
        let mut fun = LeastSquares::new();
        fun.accumulate(2.0, 2.0);
        fun.accumulate(4.0, 3.0);
        fun.accumulate(6.0, 6.0);

        assert_eq!(fun.n_examples(), 3);
        assert_abs_diff_eq!(fun.loss(), 1.0);
        assert_abs_diff_eq!(fun.loss() / 3.0, 1.0 / 3.0);
    }

    #[test]
    fn least_squares_reduction_bounds() {
        let mut perfect = LeastSquares::new();
        perfect.accumulate(1.0, 1.0);
        perfect.accumulate(3.0, 3.0);
        assert_abs_diff_eq!(perfect.reduction(), 1.0);

        // Constant targets: zero baseline loss, reduction pinned to 0.
        let mut constant = LeastSquares::new();
        constant.accumulate(2.0, 1.0);
        constant.accumulate(2.0, 1.0);
        assert_eq!(constant.reduction(), 0.0);
    }

    fn constant_forest(value: f64) -> Forest {
        let mut forest = Forest::new();
        forest.push_tree(Tree::single_leaf(value));
        forest
    }

    #[test]
    fn evaluator_accumulates_targets_and_loss() {
        let forest = constant_forest(1.0);
        let mut evaluator = Evaluator::new(&forest, RowSchema::new(1), false);
        evaluator.score_line("2.0 0.0");
        evaluator.score_line("4.0 0.0");
        evaluator.score_line("junk line");

        let report = evaluator.report();
        assert_eq!(report.n_examples, 2);
        assert_eq!(report.rows_dropped, 1);
        assert_abs_diff_eq!(report.sum_y, 6.0);
        assert_abs_diff_eq!(report.sum_y2, 20.0);
        assert_abs_diff_eq!(report.loss, 1.0 + 9.0);
        assert!(report.prefix_losses.is_none());
    }

    #[test]
    fn agreement_counts_within_tolerance_only() {
        let forest = constant_forest(1.0);
        let mut evaluator = Evaluator::new(&forest, RowSchema::new(1), false);
        evaluator.score_line("0.0 0.0 1.0"); // exact
        evaluator.score_line("0.0 0.0 1.000009"); // inside 1e-5
        evaluator.score_line("0.0 0.0 1.1"); // outside
        evaluator.score_line("0.0 0.0"); // no logged score

        assert_eq!(evaluator.report().agreement, 2);
    }

    #[test]
    fn prefix_losses_match_per_prefix_accumulation() {
        let mut forest = Forest::new();
        forest.push_tree(Tree::single_leaf(1.0));
        forest.push_tree(Tree::single_leaf(0.5));

        let mut evaluator = Evaluator::new(&forest, RowSchema::new(1), true);
        evaluator.score_line("2.0 0.0");

        let report = evaluator.report();
        let prefix_losses = report.prefix_losses.unwrap();
        // Prefix 1 predicts 1.0 (err 1.0), prefix 2 predicts 1.5 (err 0.5).
        assert_abs_diff_eq!(prefix_losses[0], 1.0);
        assert_abs_diff_eq!(prefix_losses[1], 0.25);
        // Primary accumulator saw the full-ensemble score.
        assert_abs_diff_eq!(report.loss, 0.25);
    }

    #[test]
    fn report_display_shape() {
        let report = EvalReport {
            n_examples: 2,
            loss: 1.0,
            reduction: 0.5,
            sum_y: 6.0,
            sum_y2: 20.0,
            agreement: 1,
            rows_dropped: 0,
            prefix_losses: Some(vec![4.0, 1.0]),
        };
        let text = format!("{report}");
        assert!(text.starts_with("Optimal num tree stats:\t2\t4\t1\n"));
        assert!(text.contains("Avg loss on test: 0.5\n"));
        assert!(text.ends_with("2\t0.5\t1\t6\t20\t1\n"));
    }
}
