//! Metrics sink abstraction.
//!
//! The controller emits one action event per observable backpressure
//! decision. Sinks translate those into whatever the embedding application
//! counts with; the in-memory sink exists for tests and dev.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Backpressure action recorded by the admission controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    /// A work item was parked on the backlog.
    Queued,
    /// Overflow work ran synchronously on the submitting thread.
    CallerRan,
    /// A work item was dropped at capacity.
    Rejected,
    /// The underlying pool refused a hand-off.
    SubmitFailed,
}

impl DispatchAction {
    /// Stable name for dashboards and log correlation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "dispatch_queued",
            Self::CallerRan => "dispatch_caller_runs",
            Self::Rejected => "dispatch_rejected",
            Self::SubmitFailed => "dispatch_submit_failure",
        }
    }
}

/// Metrics sink abstraction.
pub trait MetricsSink: Send + Sync {
    /// Record one action occurrence.
    fn record(&self, action: DispatchAction);
}

/// In-memory metrics sink with a bounded buffer, for testing and dev.
pub struct InMemoryMetricsSink {
    events: Mutex<VecDeque<DispatchAction>>,
    max_events: usize,
}

impl InMemoryMetricsSink {
    /// Create a new in-memory sink keeping at most `max_events` entries.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Snapshot of recorded actions, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DispatchAction> {
        self.events.lock().iter().copied().collect()
    }

    /// Count of recorded occurrences of `action`.
    #[must_use]
    pub fn count(&self, action: DispatchAction) -> usize {
        self.events.lock().iter().filter(|a| **a == action).count()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, action: DispatchAction) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(action);
    }
}
