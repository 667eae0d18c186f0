//! Concurrent chunked ingestion.
//!
//! [`load_chunks`] splits a line stream into bounded [`Chunk`]s and parses
//! them, either sequentially on the calling thread or fanned out over the
//! shared [`WorkerPool`]. Parsing may complete in any order across workers;
//! the returned chunk list is always in original file order, so the dataset
//! produced by the strictly sequential [`merge_chunks`] step is identical
//! whether the pool has 0, 1, or N threads.

use std::io::BufRead;
use std::sync::{mpsc, Arc};

use crate::concurrency::{Latch, WorkerPool};
use crate::data::{Dataset, RowSchema};

mod chunk;
pub use chunk::Chunk;

/// Default number of lines per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2500;

/// Read `reader` into parsed chunks of at most `chunk_size` lines each.
///
/// With a pool, every chunk is moved into its own task; each task parses,
/// hands the chunk back over a channel tagged with its original index, and
/// decrements a latch sized to the chunk count. The orchestrating thread
/// suspends only on the latch wait, then reassembles the list by index.
/// Without a pool (or with no chunks) parsing runs inline, in list order.
///
/// Only I/O errors from the reader propagate; malformed lines are dropped
/// inside the chunks and surface as per-chunk counters.
pub fn load_chunks<R: BufRead>(
    reader: R,
    chunk_size: usize,
    schema: &RowSchema,
    pool: Option<&WorkerPool>,
) -> std::io::Result<Vec<Chunk>> {
    debug_assert!(chunk_size > 0, "chunk_size must be positive");
    let mut chunks = Vec::new();
    let mut current = Chunk::new(schema.n_features());

    for line in reader.lines() {
        current.add_line(&line?);
        if current.line_count() >= chunk_size {
            chunks.push(std::mem::replace(
                &mut current,
                Chunk::new(schema.n_features()),
            ));
        }
    }
    if current.line_count() > 0 {
        chunks.push(current);
    }

    match pool {
        Some(pool) if !chunks.is_empty() => Ok(parse_on_pool(chunks, schema, pool)),
        _ => {
            for chunk in &mut chunks {
                chunk.parse(schema);
            }
            Ok(chunks)
        }
    }
}

/// Parse every chunk on the pool and return them in original order.
fn parse_on_pool(chunks: Vec<Chunk>, schema: &RowSchema, pool: &WorkerPool) -> Vec<Chunk> {
    let n_chunks = chunks.len();
    let latch = Arc::new(Latch::new(n_chunks));
    let (done_tx, done_rx) = mpsc::channel::<(usize, Chunk)>();

    for (index, mut chunk) in chunks.into_iter().enumerate() {
        let latch = Arc::clone(&latch);
        let done_tx = done_tx.clone();
        let schema = schema.clone();
        pool.spawn(move || {
            chunk.parse(&schema);
            // The send must precede the decrement: once the latch releases,
            // every parsed chunk is already in the channel.
            let _ = done_tx.send((index, chunk));
            latch.decrement();
        });
    }
    drop(done_tx);
    latch.wait();

    let mut slots: Vec<Option<Chunk>> = (0..n_chunks).map(|_| None).collect();
    for (index, chunk) in done_rx.try_iter() {
        slots[index] = Some(chunk);
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("worker finished without returning its chunk"))
        .collect()
}

/// Totals from a merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows appended to the dataset.
    pub rows_merged: usize,
    /// Malformed lines dropped during parsing of the merged chunks.
    pub rows_dropped: usize,
    /// Whether the dataset refused a row, ending the merge early.
    pub exhausted: bool,
}

/// Merge parsed chunks into `dataset`, strictly sequentially and in original
/// chunk order.
///
/// This step is never parallelized: the dataset is not safe for concurrent
/// mutation and downstream training depends on deterministic row order. A
/// short merge from any chunk stops the loop; remaining chunks are not fed.
pub fn merge_chunks(chunks: &[Chunk], dataset: &mut Dataset) -> MergeStats {
    let mut stats = MergeStats::default();
    for chunk in chunks {
        stats.rows_dropped += chunk.dropped();
        let merged = chunk.merge_into(dataset);
        stats.rows_merged += merged;
        if merged < chunk.n_rows() {
            stats.exhausted = true;
            break;
        }
    }
    stats
}
