//! An independently parseable batch of raw input lines.

use crate::data::{Dataset, RowSchema};

/// A bounded batch of raw lines plus its parsed output.
///
/// Chunks are created empty by the orchestrator, filled while reading the
/// source stream, parsed exactly once (inline or on a worker), then merged
/// into the dataset and discarded. Capacity is advisory: the orchestrator,
/// not the chunk, decides when a chunk is full.
#[derive(Debug)]
pub struct Chunk {
    lines: Vec<String>,
    /// Row-major parsed feature values, `n_features` wide per row.
    features: Vec<f64>,
    targets: Vec<f64>,
    n_features: usize,
    dropped: usize,
    parsed: bool,
}

impl Chunk {
    /// Create an empty chunk for rows of the given feature width.
    pub fn new(n_features: usize) -> Self {
        Self {
            lines: Vec::new(),
            features: Vec::new(),
            targets: Vec::new(),
            n_features,
            dropped: 0,
            parsed: false,
        }
    }

    /// Buffer one raw line. Empty lines are rejected (no-op, `false`).
    pub fn add_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        self.lines.push(line.to_owned());
        true
    }

    /// Number of buffered raw lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Parse every buffered line with the row parser.
    ///
    /// Rejected lines are skipped silently and counted in [`dropped`]; a
    /// logged score on a training row is ignored. Must be called at most
    /// once; a second call would duplicate output.
    ///
    /// [`dropped`]: Chunk::dropped
    pub fn parse(&mut self, schema: &RowSchema) {
        debug_assert!(!self.parsed, "chunk parsed twice");
        debug_assert_eq!(schema.n_features(), self.n_features);
        self.features.reserve(self.lines.len() * self.n_features);
        self.targets.reserve(self.lines.len());

        for line in &self.lines {
            match schema.parse_row(line) {
                Some(row) => {
                    self.features.extend_from_slice(&row.features);
                    self.targets.push(row.target);
                }
                None => self.dropped += 1,
            }
        }
        self.parsed = true;
    }

    /// Number of successfully parsed rows.
    pub fn n_rows(&self) -> usize {
        self.targets.len()
    }

    /// Number of lines the parser rejected.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Append every parsed row to `dataset`, stopping at the first refusal.
    ///
    /// Returns the count successfully merged, which is less than
    /// [`n_rows`](Chunk::n_rows) when the dataset's capacity ran out. A short
    /// merge is a stop signal for the caller, not an error.
    pub fn merge_into(&self, dataset: &mut Dataset) -> usize {
        debug_assert_eq!(
            self.features.len(),
            self.targets.len() * self.n_features,
            "parsed feature and target buffers out of step"
        );
        for (i, (row, &target)) in self
            .features
            .chunks_exact(self.n_features)
            .zip(&self.targets)
            .enumerate()
        {
            if !dataset.add_vector(row, target) {
                return i;
            }
        }
        self.targets.len()
    }
}
