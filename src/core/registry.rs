//! Handle-based registry for cancellable scheduled work.
//!
//! The registry implements no timing or threading of its own: it allocates
//! monotonically increasing [`TaskId`]s, forwards execution to the host's
//! scheduling primitives (or to the admission controller for unconstrained
//! async work), and keeps each returned [`CancelHandle`] until the task
//! fires, is cancelled, or the registry shuts down.
//!
//! Per-handle lifecycle: one-shot tasks remove themselves on completion;
//! periodic tasks persist until explicitly cancelled. The registry never
//! tracks "running", only whether a task will fire again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::{
    AdmissionController, CancelHandle, Executor, HostScheduler, RecurringWorkItem, Target, TaskId,
    WorkItem,
};

type HandleMap = Arc<RwLock<HashMap<TaskId, Box<dyn CancelHandle>>>>;

/// Registry of outstanding scheduled tasks, keyed by monotonic id.
///
/// The map is read-heavy and single-writer-per-key: a given id is removed
/// either by its own completion wrapper or by one explicit `cancel` call,
/// never both racing on live state, so an `RwLock<HashMap>` needs no
/// external coordination.
pub struct TaskRegistry<H: HostScheduler, E: Executor> {
    host: Arc<H>,
    gate: AdmissionController<E>,
    next_id: AtomicU64,
    tasks: HandleMap,
}

impl<H: HostScheduler, E: Executor> TaskRegistry<H, E> {
    /// Create a registry over the host primitives and the admission gate.
    #[must_use]
    pub fn new(host: Arc<H>, gate: AdmissionController<E>) -> Self {
        Self {
            host,
            gate,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fire-and-forget work on the shared pool, subject to admission control.
    pub fn run_async(&self, work: WorkItem) {
        self.gate.submit(work);
    }

    /// Fire-and-forget work on the host's global thread, no handle.
    pub fn run_global(&self, work: WorkItem) {
        self.host.execute(Target::Global, work);
    }

    /// Fire-and-forget work on the thread owning `target`, no handle.
    ///
    /// Hosts fall back to global execution when the affinity key is absent.
    pub fn run_at(&self, target: Target, work: WorkItem) {
        self.host.execute(target, work);
    }

    /// Schedule `work` to run once on `target` after `delay`.
    ///
    /// A zero delay requests the next scheduling opportunity. The returned
    /// id is valid for [`Self::cancel`] until the task fires; completion
    /// removes it from the registry even if the work panics.
    pub fn schedule_once(&self, target: Target, delay: Duration, work: WorkItem) -> TaskId {
        let id = self.allocate_id();
        let tasks = Arc::clone(&self.tasks);
        let wrapped: WorkItem = Box::new(move || {
            let _cleanup = RemoveOnDrop { tasks, id };
            work();
        });
        let handle = self.host.schedule_once(target, delay, wrapped);
        self.tasks.write().insert(id, handle);
        id
    }

    /// Schedule `work` to run on `target` every `period` after `delay`.
    ///
    /// The id stays registered and cancellable until [`Self::cancel`]
    /// or [`Self::shutdown`]. Each firing reuses the host's recurring
    /// primitive; there is no re-registration per tick. Periods are clamped
    /// to at least one millisecond.
    pub fn schedule_periodic(
        &self,
        target: Target,
        delay: Duration,
        period: Duration,
        work: RecurringWorkItem,
    ) -> TaskId {
        let id = self.allocate_id();
        let period = period.max(Duration::from_millis(1));
        let handle = self.host.schedule_periodic(target, delay, period, work);
        self.tasks.write().insert(id, handle);
        id
    }

    /// Cancel a scheduled task.
    ///
    /// Idempotent: unknown, already-fired, and already-cancelled ids are
    /// no-ops. Cancellation never interrupts an execution already
    /// dispatched to a worker thread.
    pub fn cancel(&self, id: TaskId) {
        let handle = self.tasks.write().remove(&id);
        if let Some(handle) = handle {
            handle.cancel();
        }
    }

    /// Cancel every outstanding task and clear the registry.
    ///
    /// Used during teardown so no recurring work outlives its owner.
    pub fn shutdown(&self) {
        let drained: Vec<(TaskId, Box<dyn CancelHandle>)> = {
            let mut tasks = self.tasks.write();
            tasks.drain().collect()
        };
        let count = drained.len();
        for (_, handle) in drained {
            handle.cancel();
        }
        debug!(cancelled = count, "task registry shut down");
    }

    /// Number of outstanding handles.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tasks.read().len()
    }

    /// The admission gate backing [`Self::run_async`], for snapshots and
    /// the kill-switch.
    #[must_use]
    pub const fn gate(&self) -> &AdmissionController<E> {
        &self.gate
    }

    fn allocate_id(&self) -> TaskId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Removes a one-shot id from the registry on drop, covering panics in the
/// scheduled work.
struct RemoveOnDrop {
    tasks: HandleMap,
    id: TaskId,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.tasks.write().remove(&self.id);
    }
}
