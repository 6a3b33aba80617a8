//! Core dispatching abstractions: admission control, scheduled-task
//! registry, and the trait seam to the host runtime.

pub mod admission;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod registry;

pub use admission::{AdmissionController, AdmissionSnapshot};
pub use error::{AppResult, DispatchError};
pub use executor::{
    CancelHandle, Executor, HostScheduler, NeverRestricted, RecurringWorkItem, Target, TaskId,
    ThreadGuard, WorkItem,
};
pub use metrics::{DispatchAction, InMemoryMetricsSink, MetricsSink};
pub use registry::TaskRegistry;
