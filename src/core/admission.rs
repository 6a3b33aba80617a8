//! Bounded admission control over a shared worker pool.
//!
//! [`AdmissionController`] wraps an [`Executor`] and enforces two hard caps:
//! work items concurrently in flight on the pool, and work items parked on
//! the backlog. Overflow beyond both caps falls back to caller-runs (when
//! permitted and off the restricted thread) or counted rejection. All
//! admission state is single atomically-updated integers; no operation takes
//! a lock and no operation needs cross-field atomicity.
//!
//! ## Invariants
//! - `0 <= in_flight <= max_in_flight` and `0 <= queued <= max_queue` at
//!   every quiescent instant while backpressure is effective.
//! - `submitted == executed + rejected + in_flight + queued` at quiescence.
//! - Backlog items drain FIFO; a drain pass that loses the in-flight race
//!   re-offers to the tail and stops rather than spinning.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AdmissionConfig;
use crate::core::metrics::{DispatchAction, MetricsSink};
use crate::core::{Executor, ThreadGuard, WorkItem};
use crate::util::clock::now_ms;

/// Monotonic counters, never reset, overflow-tolerant for the process life.
#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    executed: AtomicU64,
    queued_total: AtomicU64,
    rejected: AtomicU64,
    caller_runs: AtomicU64,
    drain_runs: AtomicU64,
}

/// Read-only view of the controller, for health and ops endpoints.
///
/// Computed from atomic reads without locking. The view may be torn across
/// fields; consumers must not assume atomicity across the whole snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSnapshot {
    /// Backpressure compiled in at construction.
    pub configured_enabled: bool,
    /// Runtime kill-switch state.
    pub runtime_enabled: bool,
    /// `configured_enabled && runtime_enabled`.
    pub effective: bool,
    /// In-flight cap.
    pub max_in_flight: u32,
    /// Backlog cap.
    pub max_queue: u32,
    /// Whether overflow may run synchronously on the submitting thread.
    pub caller_runs_allowed: bool,
    /// Work items currently executing on the pool.
    pub in_flight: u32,
    /// Work items parked on the backlog.
    pub queued: u32,
    /// Total submissions accepted by `submit`.
    pub submitted: u64,
    /// Total work items that finished running (pool or caller-runs).
    pub executed: u64,
    /// Total work items that were ever parked on the backlog.
    pub queued_total: u64,
    /// Total work items dropped (capacity or pool hand-off failure).
    pub rejected: u64,
    /// Total work items run synchronously on the submitting thread.
    pub caller_runs: u64,
    /// Total backlog items promoted to the pool by drain passes.
    pub drain_runs: u64,
    /// Last backlog park, ms since epoch (0 if never).
    pub last_queue_at_ms: u64,
    /// Last rejection, ms since epoch (0 if never).
    pub last_reject_at_ms: u64,
    /// Last caller-runs execution, ms since epoch (0 if never).
    pub last_caller_run_at_ms: u64,
}

struct Inner<E: Executor> {
    delegate: Arc<E>,
    guard: Arc<dyn ThreadGuard>,
    metrics: Option<Arc<dyn MetricsSink>>,
    configured_enabled: bool,
    max_in_flight: u32,
    max_queue: u32,
    caller_runs_allowed: bool,
    runtime_enabled: AtomicBool,
    in_flight: AtomicU32,
    queued: AtomicU32,
    backlog_tx: Sender<WorkItem>,
    backlog_rx: Receiver<WorkItem>,
    counters: Counters,
    last_queue_at_ms: AtomicU64,
    last_reject_at_ms: AtomicU64,
    last_caller_run_at_ms: AtomicU64,
}

/// Bounded dispatcher guarding a shared worker pool.
///
/// Cheap to clone; clones share the same admission state. One instance per
/// wrapped pool: there is no process-wide singleton, so independent
/// controllers can coexist (and be tested) side by side.
pub struct AdmissionController<E: Executor> {
    inner: Arc<Inner<E>>,
}

impl<E: Executor> Clone for AdmissionController<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Executor> AdmissionController<E> {
    /// Create a controller around `delegate` with the given limits.
    ///
    /// `max_in_flight` is raised to at least 1; `max_queue` of 0 disables
    /// the backlog entirely.
    #[must_use]
    pub fn new(cfg: AdmissionConfig, delegate: Arc<E>, guard: Arc<dyn ThreadGuard>) -> Self {
        let (backlog_tx, backlog_rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                delegate,
                guard,
                metrics: None,
                configured_enabled: cfg.enabled,
                max_in_flight: cfg.max_in_flight.max(1),
                max_queue: cfg.max_queue,
                caller_runs_allowed: cfg.caller_runs_off_restricted,
                runtime_enabled: AtomicBool::new(true),
                in_flight: AtomicU32::new(0),
                queued: AtomicU32::new(0),
                backlog_tx,
                backlog_rx,
                counters: Counters::default(),
                last_queue_at_ms: AtomicU64::new(0),
                last_reject_at_ms: AtomicU64::new(0),
                last_caller_run_at_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a metrics sink receiving one event per backpressure decision.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.metrics = Some(metrics),
            // Already shared; a sink must be attached before the first clone.
            None => warn!("metrics sink ignored: controller already shared"),
        }
        self
    }

    /// Accept a work item, never blocking and never failing.
    ///
    /// The item is handed to the pool, parked on the backlog, run
    /// synchronously on the calling thread, or dropped, in that order of
    /// preference. Failure is observable only through [`Self::snapshot`] and
    /// logs; the contract is fire-and-forget.
    pub fn submit(&self, work: WorkItem) {
        self.inner.submit(work);
    }

    /// Read-only, lock-free, possibly torn view of all counters and flags.
    #[must_use]
    pub fn snapshot(&self) -> AdmissionSnapshot {
        self.inner.snapshot()
    }

    /// Backpressure compiled in at construction.
    #[must_use]
    pub fn configured_enabled(&self) -> bool {
        self.inner.configured_enabled
    }

    /// Runtime kill-switch state.
    #[must_use]
    pub fn runtime_enabled(&self) -> bool {
        self.inner.runtime_enabled.load(Ordering::Acquire)
    }

    /// Whether backpressure is currently effective.
    #[must_use]
    pub fn effective(&self) -> bool {
        self.inner.effective()
    }

    /// Toggle the operational kill-switch.
    ///
    /// With the switch off every submission bypasses admission and goes
    /// straight to the pool, so operators can shed the safety mechanism
    /// during incident response without a restart.
    pub fn set_runtime_enabled(&self, enabled: bool) {
        self.inner.runtime_enabled.store(enabled, Ordering::Release);
        info!(enabled, "dispatch backpressure kill-switch toggled");
    }
}

impl<E: Executor> Inner<E> {
    fn effective(&self) -> bool {
        self.configured_enabled && self.runtime_enabled.load(Ordering::Acquire)
    }

    fn record(&self, action: DispatchAction) {
        if let Some(metrics) = &self.metrics {
            metrics.record(action);
        }
    }

    fn submit(self: &Arc<Self>, work: WorkItem) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if !self.effective() {
            self.submit_to_pool(work, false);
            return;
        }
        let work = match self.try_direct(work) {
            Ok(()) => return,
            Err(work) => work,
        };
        let work = match self.try_queue(work) {
            Ok(()) => return,
            Err(work) => work,
        };
        if self.caller_runs_allowed && !self.guard.is_restricted() {
            self.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
            self.last_caller_run_at_ms.store(now_ms(), Ordering::Relaxed);
            self.record(DispatchAction::CallerRan);
            debug!("capacity exhausted; running work item on the submitting thread");
            self.run_task(work);
            return;
        }
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        self.last_reject_at_ms.store(now_ms(), Ordering::Relaxed);
        self.record(DispatchAction::Rejected);
        warn!(
            in_flight = self.in_flight.load(Ordering::Acquire),
            queued = self.queued.load(Ordering::Acquire),
            "dispatch rejection: capacity exhausted and no fallback permitted"
        );
    }

    /// Reserve an in-flight slot and hand the item to the pool.
    fn try_direct(self: &Arc<Self>, work: WorkItem) -> Result<(), WorkItem> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.max_in_flight {
                return Err(work);
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.submit_to_pool(work, true);
        Ok(())
    }

    /// Reserve a backlog slot and park the item.
    fn try_queue(&self, work: WorkItem) -> Result<(), WorkItem> {
        let mut current = self.queued.load(Ordering::Acquire);
        loop {
            if current >= self.max_queue {
                return Err(work);
            }
            match self.queued.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        if self.backlog_tx.send(work).is_err() {
            // Unreachable while the controller holds the receiver.
            self.queued.fetch_sub(1, Ordering::AcqRel);
            tracing::error!("backlog channel closed; work item lost");
            return Ok(());
        }
        self.counters.queued_total.fetch_add(1, Ordering::Relaxed);
        self.last_queue_at_ms.store(now_ms(), Ordering::Relaxed);
        self.record(DispatchAction::Queued);
        Ok(())
    }

    /// Hand a work item to the pool.
    ///
    /// `admitted` marks items that won an in-flight slot: their completion
    /// wrapper releases the slot and triggers a drain pass, even when the
    /// item panics. Bypass items (backpressure not effective) never touch
    /// `in_flight`, so a kill-switch flip mid-flight cannot underflow it.
    fn submit_to_pool(self: &Arc<Self>, work: WorkItem, admitted: bool) {
        let inner = Arc::clone(self);
        let wrapped: WorkItem = Box::new(move || {
            let _slot = admitted.then(|| SlotRelease {
                inner: Arc::clone(&inner),
            });
            inner.run_task(work);
        });
        if let Err(err) = self.delegate.execute(wrapped) {
            // A failed hand-off is a rejection, not a caller-visible error.
            if admitted {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            self.last_reject_at_ms.store(now_ms(), Ordering::Relaxed);
            self.record(DispatchAction::SubmitFailed);
            warn!(error = %err, "pool hand-off failed; work item dropped");
        }
    }

    /// Run a work item, bumping `executed` even if it panics.
    fn run_task(self: &Arc<Self>, work: WorkItem) {
        let _executed = ExecutedGuard {
            inner: Arc::clone(self),
        };
        work();
    }

    /// Promote backlog items into freed in-flight slots.
    ///
    /// Runs after every admitted completion. Each pass attempts the
    /// in-flight CAS once per popped item; on a lost race the item is
    /// re-offered to the backlog tail and the pass stops, bounding drain
    /// cost to O(1) failed attempts instead of busy-looping.
    fn drain(self: &Arc<Self>) {
        if !self.effective() {
            return;
        }
        loop {
            let current = self.in_flight.load(Ordering::Acquire);
            if current >= self.max_in_flight {
                return;
            }
            let Ok(next) = self.backlog_rx.try_recv() else {
                return;
            };
            // The popped item leaves the backlog count immediately, floored
            // at zero to tolerate transient divergence mid-operation.
            let _ = self
                .queued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                    Some(v.saturating_sub(1))
                });
            if self
                .in_flight
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Lost the slot to a direct admission; the winner's
                // completion will drain. Re-offering lands at the tail.
                self.queued.fetch_add(1, Ordering::AcqRel);
                if self.backlog_tx.send(next).is_err() {
                    tracing::error!("backlog channel closed during drain; work item lost");
                }
                return;
            }
            self.counters.drain_runs.fetch_add(1, Ordering::Relaxed);
            debug!(in_flight = current + 1, "drained backlog item into freed slot");
            self.submit_to_pool(next, true);
        }
    }

    fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            configured_enabled: self.configured_enabled,
            runtime_enabled: self.runtime_enabled.load(Ordering::Acquire),
            effective: self.effective(),
            max_in_flight: self.max_in_flight,
            max_queue: self.max_queue,
            caller_runs_allowed: self.caller_runs_allowed,
            in_flight: self.in_flight.load(Ordering::Acquire),
            queued: self.queued.load(Ordering::Acquire),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            queued_total: self.counters.queued_total.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            caller_runs: self.counters.caller_runs.load(Ordering::Relaxed),
            drain_runs: self.counters.drain_runs.load(Ordering::Relaxed),
            last_queue_at_ms: self.last_queue_at_ms.load(Ordering::Relaxed),
            last_reject_at_ms: self.last_reject_at_ms.load(Ordering::Relaxed),
            last_caller_run_at_ms: self.last_caller_run_at_ms.load(Ordering::Relaxed),
        }
    }
}

/// Releases an in-flight slot and triggers a drain pass on drop, so a
/// panicking work item still frees its slot during unwind.
struct SlotRelease<E: Executor> {
    inner: Arc<Inner<E>>,
}

impl<E: Executor> Drop for SlotRelease<E> {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.inner.drain();
    }
}

/// Bumps `executed` on drop, covering panicking work items.
struct ExecutedGuard<E: Executor> {
    inner: Arc<Inner<E>>,
}

impl<E: Executor> Drop for ExecutedGuard<E> {
    fn drop(&mut self) {
        self.inner.counters.executed.fetch_add(1, Ordering::Relaxed);
    }
}
