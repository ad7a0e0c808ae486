//! Task managers for parallel layer compilation
//!
//! ## Table of Contents
//! - **CompileTask**: A labelled unit of compilation work
//! - **TaskOutcome**: Per-task result, reported through `drain`
//! - **BatchId**: Groups the tasks of one `schedule` call
//! - **TaskManager**: Submit/drain contract the compiler schedules through
//! - **ThreadPoolTaskManager**: Runs tasks on a rayon thread pool
//! - **InlineTaskManager**: Runs tasks on the submitting thread

use crate::compiler::CompileReport;
use crate::error::{CompileError, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

type TaskFn = Box<dyn FnOnce() -> Result<CompileReport> + Send + 'static>;

/// A labelled unit of compilation work
pub struct CompileTask {
    label: String,
    work: TaskFn,
}

impl CompileTask {
    /// Create a new task
    pub fn new<F>(label: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Result<CompileReport> + Send + 'static,
    {
        Self {
            label: label.into(),
            work: Box::new(work),
        }
    }

    /// Task label
    pub fn label(&self) -> &str {
        &self.label
    }

    // Runs the work, turning a panic into a task error.
    fn execute(self, sequence: u64) -> TaskOutcome {
        let label = self.label;
        let result = catch_unwind(AssertUnwindSafe(self.work)).unwrap_or_else(|panic| {
            Err(CompileError::task(format!(
                "task '{}' panicked: {}",
                label,
                panic_message(&*panic)
            )))
        });

        if let Err(e) = &result {
            warn!(task = %label, error = %e, "Compile task failed");
        } else {
            debug!(task = %label, "Compile task finished");
        }

        TaskOutcome {
            label,
            sequence,
            result,
        }
    }
}

impl fmt::Debug for CompileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result of one compile task
#[derive(Debug)]
pub struct TaskOutcome {
    /// Task label
    pub label: String,
    /// Submission order within the manager
    pub sequence: u64,
    /// Report or failure
    pub result: Result<CompileReport>,
}

impl TaskOutcome {
    /// Check if the task succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Identifies a group of tasks drained together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Accepts compile tasks and reports their outcomes
///
/// Outcomes are kept per batch, so callers sharing one manager only ever
/// drain their own tasks.
pub trait TaskManager: Send + Sync {
    /// Open a new batch
    fn begin_batch(&self) -> BatchId;

    /// Queue a task for execution in `batch`
    fn submit(&self, batch: BatchId, task: CompileTask);

    /// Wait for every task submitted to `batch` and return its outcomes in
    /// submission order; the batch is closed afterwards
    fn drain(&self, batch: BatchId) -> Vec<TaskOutcome>;

    /// Number of submitted tasks, across all batches, that have not reported yet
    fn pending(&self) -> usize;

    /// Manager name for logging
    fn name(&self) -> &str {
        "custom"
    }
}

/// Shared task manager handle
pub type BoxedTaskManager = Arc<dyn TaskManager>;

#[derive(Default)]
struct BatchState {
    outstanding: usize,
    finished: Vec<TaskOutcome>,
}

#[derive(Default)]
struct PoolState {
    next_batch: u64,
    next_sequence: u64,
    batches: HashMap<BatchId, BatchState>,
}

impl PoolState {
    fn open_batch(&mut self) -> BatchId {
        let batch = BatchId(self.next_batch);
        self.next_batch += 1;
        self.batches.insert(batch, BatchState::default());
        batch
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn close_batch(&mut self, batch: BatchId) -> Vec<TaskOutcome> {
        let mut outcomes = self
            .batches
            .remove(&batch)
            .map(|b| b.finished)
            .unwrap_or_default();
        outcomes.sort_by_key(|o| o.sequence);
        outcomes
    }
}

/// Task manager backed by a rayon thread pool
///
/// `drain` blocks the caller, so it must not be called from inside one of
/// the pool's own tasks.
pub struct ThreadPoolTaskManager {
    pool: rayon::ThreadPool,
    workers: usize,
    state: Arc<(Mutex<PoolState>, Condvar)>,
}

impl ThreadPoolTaskManager {
    /// Create a manager with `workers` threads (0 = one per CPU)
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("layer-compile-{}", i))
            .build()
            .map_err(|e| CompileError::config(format!("Failed to build thread pool: {}", e)))?;
        let workers = pool.current_num_threads();

        debug!(workers = workers, "Thread pool task manager created");
        Ok(Self {
            pool,
            workers,
            state: Arc::new((Mutex::new(PoolState::default()), Condvar::new())),
        })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl TaskManager for ThreadPoolTaskManager {
    fn begin_batch(&self) -> BatchId {
        self.state.0.lock().open_batch()
    }

    fn submit(&self, batch: BatchId, task: CompileTask) {
        let sequence = {
            let mut state = self.state.0.lock();
            let sequence = state.next_sequence();
            state.batches.entry(batch).or_default().outstanding += 1;
            sequence
        };

        let shared = Arc::clone(&self.state);
        self.pool.spawn(move || {
            let outcome = task.execute(sequence);
            let (lock, done) = &*shared;
            let mut state = lock.lock();
            let entry = state.batches.entry(batch).or_default();
            entry.finished.push(outcome);
            entry.outstanding -= 1;
            if entry.outstanding == 0 {
                done.notify_all();
            }
        });
    }

    fn drain(&self, batch: BatchId) -> Vec<TaskOutcome> {
        let (lock, done) = &*self.state;
        let mut state = lock.lock();
        while state.batches.get(&batch).is_some_and(|b| b.outstanding > 0) {
            done.wait(&mut state);
        }
        state.close_batch(batch)
    }

    fn pending(&self) -> usize {
        self.state.0.lock().batches.values().map(|b| b.outstanding).sum()
    }

    fn name(&self) -> &str {
        "thread-pool"
    }
}

impl fmt::Debug for ThreadPoolTaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolTaskManager")
            .field("workers", &self.workers)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Task manager that runs each task as it is submitted
#[derive(Default)]
pub struct InlineTaskManager {
    state: Mutex<PoolState>,
}

impl InlineTaskManager {
    /// Create a new inline manager
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for InlineTaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineTaskManager")
            .field("batches", &self.state.lock().batches.len())
            .finish()
    }
}

impl TaskManager for InlineTaskManager {
    fn begin_batch(&self) -> BatchId {
        self.state.lock().open_batch()
    }

    fn submit(&self, batch: BatchId, task: CompileTask) {
        let sequence = self.state.lock().next_sequence();
        // Run outside the lock so tasks may submit follow-up work.
        let outcome = task.execute(sequence);
        self.state
            .lock()
            .batches
            .entry(batch)
            .or_default()
            .finished
            .push(outcome);
    }

    fn drain(&self, batch: BatchId) -> Vec<TaskOutcome> {
        self.state.lock().close_batch(batch)
    }

    fn pending(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "inline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn report(label: &str) -> CompileReport {
        CompileReport::new(label, 0.0)
    }

    #[test]
    fn test_thread_pool_runs_all_in_order() {
        let manager = ThreadPoolTaskManager::new(4).unwrap();
        assert_eq!(manager.workers(), 4);

        let batch = manager.begin_batch();
        for i in 0..32 {
            let label = format!("tile-{}", i);
            manager.submit(batch, CompileTask::new(label.clone(), move || Ok(report(&label))));
        }

        let outcomes = manager.drain(batch);
        assert_eq!(outcomes.len(), 32);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.sequence, i as u64);
            assert_eq!(outcome.label, format!("tile-{}", i));
            assert!(outcome.is_success());
        }
        assert_eq!(manager.pending(), 0);
        assert!(manager.drain(batch).is_empty());
    }

    #[test]
    fn test_failures_are_reported_per_task() {
        let manager = ThreadPoolTaskManager::new(2).unwrap();
        let batch = manager.begin_batch();
        manager.submit(batch, CompileTask::new("ok", || Ok(report("ok"))));
        manager.submit(batch, CompileTask::new("err", || Err(CompileError::script("boom"))));
        manager.submit(batch, CompileTask::new("panic", || panic!("bad tile")));

        let outcomes = manager.drain(batch);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(matches!(outcomes[1].result, Err(CompileError::Script(_))));
        match &outcomes[2].result {
            Err(CompileError::Task(msg)) => assert!(msg.contains("bad tile")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_batches_drain_independently() {
        let manager = Arc::new(ThreadPoolTaskManager::new(4).unwrap());
        let first = manager.begin_batch();
        let second = manager.begin_batch();
        assert_ne!(first, second);

        for i in 0..10 {
            manager.submit(first, CompileTask::new(format!("a{}", i), || Ok(report("a"))));
            manager.submit(second, CompileTask::new(format!("b{}", i), || Ok(report("b"))));
        }

        let a = manager.drain(first);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|o| o.label.starts_with('a')));

        let b = manager.drain(second);
        assert_eq!(b.len(), 10);
        assert!(b.iter().all(|o| o.label.starts_with('b')));
    }

    #[test]
    fn test_concurrent_batches_keep_their_outcomes() {
        let manager = Arc::new(ThreadPoolTaskManager::new(4).unwrap());

        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|prefix| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    let batch = manager.begin_batch();
                    for i in 0..20 {
                        let label = format!("{}-{}", prefix, i);
                        manager.submit(batch, CompileTask::new(label.clone(), move || Ok(report(&label))));
                    }
                    (prefix, manager.drain(batch))
                })
            })
            .collect();

        for handle in handles {
            let (prefix, outcomes) = handle.join().unwrap();
            assert_eq!(outcomes.len(), 20);
            assert!(outcomes.iter().all(|o| o.label.starts_with(prefix)));
        }
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_inline_runs_on_submit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let manager = InlineTaskManager::new();
        let batch = manager.begin_batch();
        let other = manager.begin_batch();

        for i in 0..3 {
            let task_counter = Arc::clone(&counter);
            manager.submit(batch, CompileTask::new(format!("t{}", i), move || {
                task_counter.fetch_add(1, Ordering::SeqCst);
                Ok(report("t"))
            }));
            assert_eq!(counter.load(Ordering::SeqCst), i + 1);
        }
        manager.submit(other, CompileTask::new("x", || Ok(report("x"))));

        let outcomes = manager.drain(batch);
        assert_eq!(outcomes.iter().map(|o| o.sequence).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(manager.drain(other).len(), 1);
        assert_eq!(manager.pending(), 0);
    }
}
