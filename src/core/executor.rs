//! Execution traits consumed by the dispatcher.
//!
//! The dispatcher core implements none of the actual execution machinery.
//! These traits are the seam to the host runtime: a plain worker pool for
//! unconstrained async work, and partition-aware scheduling primitives for
//! work bound to a global or affinity thread.

use std::time::Duration;

use crate::core::DispatchError;

/// A fire-and-forget unit of work. Ownership transfers at submission.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Re-runnable work for periodic schedules.
///
/// A one-shot [`WorkItem`] cannot legally fire twice, so recurring schedules
/// take a shared-call closure instead.
pub type RecurringWorkItem = Box<dyn Fn() + Send + Sync + 'static>;

/// Unique handle for a scheduled task, allocated from a monotonic counter
/// starting at 1.
pub type TaskId = u64;

/// Execution affinity for scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The host's single designated non-affine thread.
    Global,
    /// The thread owning the given spatial/entity partition. Hosts fall back
    /// to global execution when the key is absent.
    Affinity(u64),
}

/// Abstraction over the shared worker pool wrapped by the admission
/// controller.
pub trait Executor: Send + Sync + 'static {
    /// Hand one work item to the pool.
    ///
    /// An `Err` means the hand-off itself failed at the infrastructure level
    /// (pool shutting down), not that the work ran and failed. The admission
    /// controller compensates its counters and treats this as a rejection.
    fn execute(&self, work: WorkItem) -> Result<(), DispatchError>;
}

/// Cancellation handle returned by a host scheduling primitive.
///
/// `cancel` stops future firings. It must be idempotent and must tolerate
/// handles whose task already fired or was cancelled elsewhere.
pub trait CancelHandle: Send + Sync {
    /// Stop any firing that has not happened yet.
    fn cancel(&self);
}

/// Host scheduling primitives for affinity-bound and timed work.
///
/// Implementations own the threads; the registry only tracks handles. A
/// production host partitions work by spatial/entity ownership; see
/// [`TimerHost`](crate::infra::TimerHost) for an in-process stand-in.
pub trait HostScheduler: Send + Sync + 'static {
    /// Run `work` once on the target thread as soon as possible, without a
    /// cancellation handle.
    fn execute(&self, target: Target, work: WorkItem);

    /// Run `work` once on the target thread after `delay`.
    fn schedule_once(&self, target: Target, delay: Duration, work: WorkItem)
        -> Box<dyn CancelHandle>;

    /// Run `work` on the target thread every `period` after an initial
    /// `delay`, until the returned handle is cancelled.
    fn schedule_periodic(
        &self,
        target: Target,
        delay: Duration,
        period: Duration,
        work: RecurringWorkItem,
    ) -> Box<dyn CancelHandle>;
}

/// Identifies the host's latency-sensitive thread.
///
/// The caller-runs overflow policy is refused on that thread: a synchronous
/// fallback of unbounded duration must never land on a main/tick thread.
pub trait ThreadGuard: Send + Sync + 'static {
    /// True when the calling thread must not run overflow work inline.
    fn is_restricted(&self) -> bool;
}

/// A [`ThreadGuard`] for hosts without a latency-sensitive thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRestricted;

impl ThreadGuard for NeverRestricted {
    fn is_restricted(&self) -> bool {
        false
    }
}
