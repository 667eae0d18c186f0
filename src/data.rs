//! Row parsing and bucketized training storage.
//!
//! A [`RowSchema`] turns raw text lines into fixed-width feature vectors; a
//! [`Dataset`] accumulates parsed rows, compresses features into at most 256
//! quantile buckets per feature, and enforces the training-example cap.
//!
//! Malformed rows are rejected silently: `parse_row` returns `None` and the
//! caller decides whether to count the drop. Nothing in this module retries.

use crate::config::Config;

/// Maximum number of buckets per feature; bin ids fit in a `u8`.
pub const MAX_BUCKETS: usize = 256;

// =============================================================================
// Row parsing
// =============================================================================

/// A successfully parsed data row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// Feature values, exactly `RowSchema::n_features` wide.
    pub features: Vec<f64>,
    /// Regression target.
    pub target: f64,
    /// Score previously logged for this row, present only in test data.
    /// Used by the evaluator's agreement check, never for training.
    pub logged_score: Option<f64>,
}

/// Fixed-width row parser.
///
/// The text format is whitespace separated: the target first, then one value
/// per feature, then optionally a previously logged model score. Any other
/// column count, any unparseable number, or any non-finite value rejects the
/// row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    n_features: usize,
}

impl RowSchema {
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }

    /// Schema matching a config's feature list.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.n_features())
    }

    /// Fixed feature width.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Parse one line. Returns `None` for malformed rows; rejection is
    /// silent by contract.
    pub fn parse_row(&self, line: &str) -> Option<ParsedRow> {
        let mut fields = line.split_whitespace();

        let target = parse_finite(fields.next()?)?;
        let mut features = Vec::with_capacity(self.n_features);
        for _ in 0..self.n_features {
            features.push(parse_finite(fields.next()?)?);
        }

        let logged_score = match fields.next() {
            Some(field) => Some(parse_finite(field)?),
            None => None,
        };
        if fields.next().is_some() {
            return None; // too many columns
        }

        Some(ParsedRow {
            features,
            target,
            logged_score,
        })
    }
}

fn parse_finite(field: &str) -> Option<f64> {
    let value: f64 = field.parse().ok()?;
    value.is_finite().then_some(value)
}

// =============================================================================
// Bucketized columns
// =============================================================================

/// One feature's bucketized storage: sorted cut values plus a bin id per row.
///
/// Bin `b` holds the values `v` with `cut(b-1) < v <= cut(b)`; the last bin
/// is unbounded above. The invariant `encode(v) <= b` iff `v <= cut(b)` is
/// what lets emitted trees carry raw thresholds while training runs on bins.
#[derive(Debug, Clone, Default)]
pub struct Column {
    cuts: Vec<f64>,
    bins: Vec<u8>,
}

impl Column {
    /// Number of bins (`cuts.len() + 1`).
    pub fn n_bins(&self) -> usize {
        self.cuts.len() + 1
    }

    /// Upper-bound raw value of bin `b`, defined for `b < n_bins() - 1`.
    pub fn cut(&self, bin: usize) -> f64 {
        self.cuts[bin]
    }

    /// Bin id per row, in dataset row order.
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Bin id for a raw value: the number of cuts strictly below it.
    pub fn encode(&self, value: f64) -> u8 {
        self.cuts.partition_point(|&c| c < value) as u8
    }
}

/// Pick up to `MAX_BUCKETS - 1` cut values from a sample of one feature's
/// raw values. Few distinct values are kept losslessly; beyond that, cuts
/// fall on quantile steps.
fn build_cuts(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    if values.len() <= MAX_BUCKETS - 1 {
        return values;
    }

    let n = values.len();
    let mut cuts = Vec::with_capacity(MAX_BUCKETS - 1);
    for k in 1..MAX_BUCKETS {
        cuts.push(values[k * n / MAX_BUCKETS]);
    }
    cuts.dedup();
    cuts
}

// =============================================================================
// Dataset
// =============================================================================

/// The full encoded training corpus.
///
/// Rows arrive through [`Dataset::add_vector`] in merge order. The first
/// `bucketing_sample` rows are staged raw; once the sample is complete the
/// per-feature cut points are frozen, staged rows are encoded, and every
/// later row is encoded on arrival. `close()` freezes early if the corpus is
/// smaller than the sample and must be called once before training.
///
/// Mutated only by the single orchestrating thread during merge; never
/// shared with parsing workers.
#[derive(Debug)]
pub struct Dataset {
    schema: RowSchema,
    bucketing_sample: usize,
    max_examples: Option<usize>,
    targets: Vec<f64>,
    /// Row-major staging buffer; drained on freeze.
    staged: Vec<f64>,
    columns: Vec<Column>,
    frozen: bool,
    closed: bool,
}

impl Dataset {
    /// Create an empty dataset.
    ///
    /// `bucketing_sample` is the number of rows used to fit bucket cuts
    /// (zero stages everything until `close`); `max_examples` caps the total
    /// rows accepted (`None` is unlimited).
    pub fn new(schema: RowSchema, bucketing_sample: usize, max_examples: Option<usize>) -> Self {
        let n_features = schema.n_features();
        Self {
            schema,
            bucketing_sample,
            max_examples,
            targets: Vec::new(),
            staged: Vec::new(),
            columns: vec![Column::default(); n_features],
            frozen: false,
            closed: false,
        }
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    /// Cheap clone of the row parser, handed to parsing workers.
    pub fn row_parser(&self) -> RowSchema {
        self.schema.clone()
    }

    pub fn n_features(&self) -> usize {
        self.schema.n_features()
    }

    pub fn n_examples(&self) -> usize {
        self.targets.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Bucketized storage for one feature. Valid after `close()`.
    pub fn column(&self, feature: usize) -> &Column {
        &self.columns[feature]
    }

    /// Append one row. Returns `false` (refusing the row) once the example
    /// cap is reached or the dataset is closed; the caller treats that as a
    /// stop signal, not an error.
    pub fn add_vector(&mut self, features: &[f64], target: f64) -> bool {
        debug_assert_eq!(features.len(), self.n_features(), "row width mismatch");
        if self.closed {
            return false;
        }
        if let Some(cap) = self.max_examples {
            if self.targets.len() >= cap {
                return false;
            }
        }

        if self.frozen {
            for (column, &value) in self.columns.iter_mut().zip(features) {
                column.bins.push(column.encode(value));
            }
        } else {
            self.staged.extend_from_slice(features);
        }
        self.targets.push(target);

        if !self.frozen && self.bucketing_sample > 0 && self.targets.len() >= self.bucketing_sample
        {
            self.freeze();
        }
        true
    }

    /// Finalize the dataset: freeze bucket cuts if the sample never filled,
    /// encode everything staged, and refuse all further appends.
    pub fn close(&mut self) {
        if !self.frozen {
            self.freeze();
        }
        self.closed = true;
    }

    fn freeze(&mut self) {
        let n_features = self.n_features();
        let n_rows = self.targets.len();
        debug_assert_eq!(self.staged.len(), n_rows * n_features);

        for feature in 0..n_features {
            let sample: Vec<f64> = (0..n_rows)
                .map(|row| self.staged[row * n_features + feature])
                .collect();
            let column = &mut self.columns[feature];
            column.cuts = build_cuts(sample);
            column.bins = (0..n_rows)
                .map(|row| column.encode(self.staged[row * n_features + feature]))
                .collect();
        }
        self.staged = Vec::new();
        self.frozen = true;
    }
}
