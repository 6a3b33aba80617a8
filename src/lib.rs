//! # Taskgate
//!
//! A bounded fire-and-forget task dispatcher with admission control and
//! cancellable scheduling handles.
//!
//! Taskgate sits between application code and a shared worker pool. Callers
//! hand it opaque closures; the dispatcher guarantees the pool never sees
//! unbounded concurrent or queued work, no matter how fast callers submit.
//! When capacity is exhausted it chooses a deterministic fallback: queue the
//! work, run it synchronously on the calling thread, or drop it, counted and
//! logged, never thrown.
//!
//! ## Core Problem Solved
//!
//! Shared executors in long-running services accept work without pushing
//! back. Under a submission burst that means unbounded memory growth or
//! thread explosion, and the first symptom is usually the process dying.
//! Taskgate keeps two hard caps, concurrently running work and queued
//! work, enforced with lock-free atomics, so overload degrades into
//! queueing, synchronous execution, or counted rejection instead.
//!
//! ## Components
//!
//! - [`AdmissionController`] wraps any [`Executor`] and owns all backpressure
//!   logic: in-flight/queue caps, overflow policy, backlog draining, and an
//!   operational kill-switch with a torn-read [`AdmissionSnapshot`] surface.
//! - [`TaskRegistry`] issues monotonically increasing [`TaskId`]s for
//!   delayed and periodic work scheduled on a host runtime's execution
//!   primitives, and keeps the cancel handles until the work fires or is
//!   cancelled.
//!
//! ```text
//!  callers ──► TaskRegistry ──► HostScheduler (global / affinity threads)
//!     │             │
//!     │             └────────► AdmissionController ──► Executor (pool)
//!     └──────────────────────►        │
//!                               caps, backlog, caller-runs, reject
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use taskgate::config::AdmissionConfig;
//! use taskgate::core::{AdmissionController, NeverRestricted};
//! use taskgate::runtime::WorkerPoolExecutor;
//!
//! let pool = Arc::new(WorkerPoolExecutor::start(2));
//! let gate = AdmissionController::new(
//!     AdmissionConfig::default(),
//!     Arc::clone(&pool),
//!     Arc::new(NeverRestricted),
//! );
//!
//! gate.submit(Box::new(|| {
//!     // runs on the pool, or inline/queued/dropped under pressure
//! }));
//!
//! let snap = gate.snapshot();
//! assert_eq!(snap.submitted, 1);
//! pool.shutdown();
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission control, task registry, and the consumed-trait seam.
pub mod core;
/// Configuration models for admission limits and worker pools.
pub mod config;
/// Builders to construct dispatcher components from configuration.
pub mod builders;
/// In-process host scheduling adapters.
pub mod infra;
/// Executor implementations backing the admission controller.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    AdmissionController, AdmissionSnapshot, CancelHandle, DispatchError, Executor, HostScheduler,
    NeverRestricted, RecurringWorkItem, Target, TaskId, TaskRegistry, ThreadGuard, WorkItem,
};
