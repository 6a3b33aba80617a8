//! Fixed worker pool over dedicated OS threads.
//!
//! Workers block on a channel recv, no polling. Shutdown drops the sender;
//! each worker drains what remains and exits when the channel closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::WorkerPoolConfig;
use crate::core::{DispatchError, Executor, WorkItem};

/// Shared worker pool executing fire-and-forget work items on dedicated OS
/// threads.
///
/// The pool itself applies no backpressure; its channel is unbounded by
/// design, because the [`AdmissionController`] wrapping it owns the caps.
///
/// [`AdmissionController`]: crate::core::AdmissionController
pub struct WorkerPoolExecutor {
    task_tx: Mutex<Option<Sender<WorkItem>>>,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPoolExecutor {
    /// Spawn a pool with `worker_count` threads and default stack size.
    #[must_use]
    pub fn start(worker_count: usize) -> Self {
        Self::with_config(&WorkerPoolConfig::new().with_worker_count(worker_count.max(1)))
    }

    /// Spawn a pool from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] when validation fails.
    pub fn from_config(config: &WorkerPoolConfig) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::InvalidConfig)?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: &WorkerPoolConfig) -> Self {
        let (task_tx, task_rx) = unbounded::<WorkItem>();

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            workers.push(spawn_worker(
                worker_id,
                task_rx.clone(),
                config.thread_stack_size,
            ));
        }

        info!(
            worker_count = config.worker_count,
            "worker pool started"
        );

        Self {
            task_tx: Mutex::new(Some(task_tx)),
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
        }
    }

    /// Shut down gracefully: stop accepting work, let workers drain what is
    /// already enqueued, and join them.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the sender closes the channel; workers exit after the
        // backlog drains.
        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }
        let mut workers = self.workers.lock();
        let count = workers.len();
        for worker in workers.drain(..) {
            if worker.join().is_err() {
                debug!("worker exited by panic");
            }
        }
        info!(worker_count = count, "worker pool shut down");
    }
}

impl Executor for WorkerPoolExecutor {
    fn execute(&self, work: WorkItem) -> Result<(), DispatchError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::ExecutorUnavailable("pool shut down".into()));
        }
        let guard = self.task_tx.lock();
        let Some(task_tx) = guard.as_ref() else {
            return Err(DispatchError::ExecutorUnavailable("pool shutting down".into()));
        };
        task_tx
            .send(work)
            .map_err(|_| DispatchError::ExecutorUnavailable("worker channel closed".into()))
    }
}

impl Drop for WorkerPoolExecutor {
    fn drop(&mut self) {
        // Signal shutdown but never join in Drop; workers detach and the OS
        // reclaims them. Explicit shutdown() is the graceful path.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
            debug!("worker pool dropped without explicit shutdown; workers detached");
        }
    }
}

fn spawn_worker(worker_id: usize, task_rx: Receiver<WorkItem>, stack_size: usize) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("tg-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");
            // Blocking recv; Err means the sender is gone and the backlog
            // is drained.
            while let Ok(work) = task_rx.recv() {
                work();
            }
            debug!(worker_id, "worker thread exiting");
        })
        .expect("failed to spawn worker thread")
}
