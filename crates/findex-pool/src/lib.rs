//! Fixed-size worker pool over an unbounded FIFO task queue.
//!
//! Workers are created up front and park on a condition variable while the
//! queue is empty. Every [`ThreadPool::execute`] returns a [`TaskHandle`]
//! that resolves to the task's return value; a panic inside the task is
//! captured and surfaces when the handle is observed, never in the worker.
//!
//! Shutdown is graceful: once it begins new tasks are refused, but everything
//! already queued still runs before the workers exit and are joined.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    #[error("enqueue on stopped thread pool")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, PoolError>;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Job>,
    stopping: bool,
    /// Jobs popped from the queue whose closures have not finished yet.
    in_flight: usize,
}

struct PoolShared {
    state: Mutex<PoolState>,
    job_available: Condvar,
    all_done: Condvar,
}

pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn a pool of `workers` threads. A count of zero is promoted to one.
    pub fn new(workers: usize) -> Self {
        let worker_count = workers.max(1);
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                stopping: false,
                in_flight: 0,
            }),
            job_available: Condvar::new(),
            all_done: Condvar::new(),
        });

        let workers = (0..worker_count)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("findex-worker-{i}"))
                    .spawn(move || worker_loop(&shared))
                    .unwrap_or_else(|err| panic!("failed to spawn worker thread: {err}"))
            })
            .collect();

        debug!(worker_count, "thread pool started");
        Self { shared, workers }
    }

    /// Pool sized to the machine's available parallelism.
    pub fn with_default_size() -> Self {
        Self::new(default_worker_count())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `task` and return a handle resolving to its return value.
    ///
    /// Fails with [`PoolError::Stopped`] once shutdown has begun. The handle
    /// may be dropped freely; the task still runs.
    pub fn execute<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(TaskSlot {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });
        let completion = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            *completion.result.lock() = Some(outcome);
            completion.ready.notify_all();
        });

        {
            let mut state = self.shared.state.lock();
            if state.stopping {
                return Err(PoolError::Stopped);
            }
            state.queue.push_back(job);
        }
        self.shared.job_available.notify_one();

        Ok(TaskHandle { slot })
    }

    /// Block until every task submitted so far has completed.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while !state.queue.is_empty() || state.in_flight > 0 {
            self.shared.all_done.wait(&mut state);
        }
    }

    /// Begin shutdown: refuse new tasks. Idempotent. Queued tasks still run;
    /// workers are joined by drop.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if !state.stopping {
            state.stopping = true;
            debug!(queued = state.queue.len(), "thread pool shutting down");
        }
        drop(state);
        self.shared.job_available.notify_all();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                // Worker bodies catch task panics, so this is unreachable in
                // practice; surfacing it beats aborting a teardown.
                warn!("worker thread terminated abnormally");
            }
        }
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    state.in_flight += 1;
                    break job;
                }
                if state.stopping {
                    return;
                }
                shared.job_available.wait(&mut state);
            }
        };

        job();

        let mut state = shared.state.lock();
        state.in_flight -= 1;
        if state.queue.is_empty() && state.in_flight == 0 {
            shared.all_done.notify_all();
        }
    }
}

struct TaskSlot<T> {
    result: Mutex<Option<thread::Result<T>>>,
    ready: Condvar,
}

/// Awaitable result of one queued task.
pub struct TaskHandle<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes. A panic inside the task comes back as
    /// `Err` carrying the panic payload, mirroring [`std::thread::JoinHandle`].
    pub fn wait(self) -> thread::Result<T> {
        let mut result = self.slot.result.lock();
        loop {
            if let Some(outcome) = result.take() {
                return outcome;
            }
            self.slot.ready.wait(&mut result);
        }
    }

    /// Block until the task finishes and return its value, resuming the
    /// task's panic on this thread if it had one.
    pub fn join(self) -> T {
        match self.wait() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

pub fn default_worker_count() -> usize {
    thread::available_parallelism().map_or(16, usize::from)
}
