//! Shared concurrency primitives: a single-shot countdown [`Latch`] and the
//! process-wide [`WorkerPool`] chunk parsing is scheduled onto.
//!
//! The pool is constructed once at startup and passed by handle wherever
//! parallel work is allowed; components never reach for ambient global state.

use std::sync::{Condvar, Mutex};

// =============================================================================
// Latch
// =============================================================================

/// Single-shot countdown latch.
///
/// Created with an expected completion count; `wait()` blocks the caller
/// until exactly that many `decrement()` calls have happened, from any
/// threads. A latch created with a count of zero never blocks.
///
/// The latch is not designed for reuse after reaching zero; create a fresh
/// one per orchestration run.
#[derive(Debug)]
pub struct Latch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl Latch {
    /// Create a latch expecting `count` decrements.
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Record one completion, waking waiters when the count reaches zero.
    ///
    /// Decrementing past zero is a contract violation; debug builds assert,
    /// release builds saturate so the count never goes negative.
    pub fn decrement(&self) {
        let mut count = self.count.lock().expect("latch mutex poisoned");
        debug_assert!(*count > 0, "latch decremented past zero");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    /// Block until the count reaches zero. Returns immediately if it already
    /// has (or started at zero).
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("latch mutex poisoned");
        while *count > 0 {
            count = self.zero.wait(count).expect("latch mutex poisoned");
        }
    }
}

// =============================================================================
// WorkerPool
// =============================================================================

/// Handle to the shared pool of parsing workers.
///
/// Wraps an explicitly built rayon pool. The driver builds one of these at
/// startup from `--num-threads` and threads it through every ingestion call;
/// a thread count of zero means no pool is built and ingestion runs on the
/// calling thread.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with exactly `n_threads` worker threads.
    pub fn new(n_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("treeboost-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Number of worker threads in the pool.
    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a unit of work onto the pool.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(task);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("n_threads", &self.n_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn latch_zero_returns_immediately() {
        let latch = Latch::new(0);
        latch.wait();
    }

    #[test]
    fn latch_releases_after_exact_count() {
        let latch = Arc::new(Latch::new(5));
        let released = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let latch = Arc::clone(&latch);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                latch.wait();
                released.store(1, Ordering::SeqCst);
            })
        };

        let mut workers = Vec::new();
        for _ in 0..5 {
            let latch = Arc::clone(&latch);
            workers.push(thread::spawn(move || latch.decrement()));
        }
        for w in workers {
            w.join().unwrap();
        }

        waiter.join().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latch_wait_blocks_until_last_decrement() {
        let latch = Arc::new(Latch::new(2));
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                latch.wait();
                tx.send(()).unwrap();
            })
        };

        latch.decrement();
        // One decrement outstanding: the waiter must still be blocked.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        latch.decrement();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter never released");
        waiter.join().unwrap();
    }

    #[test]
    fn pool_runs_spawned_tasks() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.n_threads(), 4);

        let latch = Arc::new(Latch::new(16));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let latch = Arc::clone(&latch);
            let counter = Arc::clone(&counter);
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                latch.decrement();
            });
        }
        latch.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }
}
