//! Priority worker pool.
//!
//! Methods are submitted with a priority derived from their position on
//! the critical path: the deeper a method sits in the (pruned) call tree,
//! the longer the chain of callers waiting on it, so it runs earlier.
//!
//! A pool of zero workers degrades to cooperative synchronous execution:
//! jobs run immediately on the submitting thread. This keeps the
//! scheduling logic identical whether or not parallelism is enabled, and
//! it is the default.
//!
//! The pool runs to completion: there is no cancellation and no timeout.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedJob {
    priority: i64,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then FIFO within a priority.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct PoolState {
    queue: BinaryHeap<QueuedJob>,
    running: usize,
    next_seq: u64,
    shutdown: bool,
}

#[derive(Default)]
struct PoolShared {
    state: Mutex<PoolState>,
    work_cv: Condvar,
    idle_cv: Condvar,
}

impl PoolShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A thread pool executing jobs in priority order.
pub struct PriorityThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl PriorityThreadPool {
    /// Creates a pool with `num_threads` workers; zero means synchronous
    /// execution on the submitting thread.
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(PoolShared::default());
        let workers = (0..num_threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || Self::worker_loop(&shared))
            })
            .collect();
        Self { shared, workers }
    }

    fn worker_loop(shared: &PoolShared) {
        loop {
            let mut state = shared.lock();
            while state.queue.is_empty() && !state.shutdown {
                state = shared
                    .work_cv
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.queue.is_empty() && state.shutdown {
                return;
            }
            let queued = state.queue.pop().expect("queue checked non-empty");
            state.running += 1;
            drop(state);

            (queued.job)();

            let mut state = shared.lock();
            state.running -= 1;
            if state.queue.is_empty() && state.running == 0 {
                shared.idle_cv.notify_all();
            }
        }
    }

    /// Number of worker threads; zero means synchronous mode.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Submits a job with a priority. In synchronous mode the job runs
    /// before `post` returns.
    pub fn post<F>(&self, priority: i64, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.workers.is_empty() {
            job();
            return;
        }
        let mut state = self.shared.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueuedJob {
            priority,
            seq,
            job: Box::new(job),
        });
        drop(state);
        self.shared.work_cv.notify_one();
    }

    /// Blocks until every submitted job, including jobs submitted by other
    /// jobs, has finished.
    pub fn join(&self) {
        let mut state = self.shared.lock();
        while !(state.queue.is_empty() && state.running == 0) {
            state = self
                .shared
                .idle_cv
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for PriorityThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
        }
        self.shared.work_cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_synchronous_mode_runs_inline() {
        let pool = PriorityThreadPool::new(0);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.post(0, move || {
            c.fetch_add(1, AtomicOrdering::SeqCst);
        });
        // Already ran: no join needed in synchronous mode.
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
        pool.join();
    }

    #[test]
    fn test_parallel_join_waits_for_chained_jobs() {
        let pool = Arc::new(PriorityThreadPool::new(2));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let c = Arc::clone(&counter);
            pool.post(1, move || {
                c.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }
        pool.join();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 8);
    }

    #[test]
    fn test_priority_order_single_worker() {
        // One worker drains a pre-filled queue highest-priority-first. The
        // first job gates the queue so the rest are ordered deterministically.
        let pool = PriorityThreadPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Mutex::new(()));

        let guard = gate.lock().expect("gate");
        {
            let gate = Arc::clone(&gate);
            pool.post(100, move || {
                let _wait = gate.lock().expect("gate");
            });
        }
        for priority in [1i64, 3, 2] {
            let order = Arc::clone(&order);
            pool.post(priority, move || {
                order.lock().expect("order").push(priority);
            });
        }
        drop(guard);
        pool.join();
        assert_eq!(*order.lock().expect("order"), vec![3, 2, 1]);
    }
}
