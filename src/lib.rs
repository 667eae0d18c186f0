//! treeboost: an offline training/evaluation driver for gradient boosted
//! tree ensembles.
//!
//! The crate is built around two subsystems that do the heavy lifting:
//!
//! - [`ingest`]: a concurrent chunked ingestion pipeline that splits a raw
//!   training corpus into bounded [`Chunk`]s, parses them in parallel on a
//!   shared [`WorkerPool`], and merges them into a [`Dataset`] in original
//!   file order regardless of thread count.
//! - [`eval`]: a streaming evaluation engine that scores a trained [`Forest`]
//!   against held-out data, optionally producing a loss curve over ensemble
//!   prefixes to aid truncating the model.
//!
//! Everything else (configuration, the bucketized dataset, the histogram
//! booster, model persistence) is glue with narrow contracts.
//!
//! # Key Types
//!
//! - [`Config`] - model configuration loaded from a JSON file
//! - [`Dataset`] / [`RowSchema`] - bucketized training storage and row parsing
//! - [`Chunk`] / [`load_chunks`] / [`merge_chunks`] - ingestion pipeline
//! - [`Forest`] / [`Tree`] - the trained ensemble
//! - [`Evaluator`] / [`LeastSquares`] - test-set scoring

pub mod concurrency;
pub mod config;
pub mod data;
pub mod eval;
pub mod ingest;
pub mod io;
pub mod model;
pub mod testing;
pub mod training;

pub use concurrency::{Latch, WorkerPool};
pub use config::Config;
pub use data::{Dataset, ParsedRow, RowSchema};
pub use eval::{EvalReport, Evaluator, LeastSquares, LossFunction};
pub use ingest::{load_chunks, merge_chunks, Chunk, MergeStats, DEFAULT_CHUNK_SIZE};
pub use model::{Forest, Tree};
pub use training::{train, TrainedModel};
