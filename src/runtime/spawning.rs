//! Thread-per-task executor.
//!
//! The reference shape for the pool the admission controller wraps: every
//! work item gets its own short-lived OS thread, so the executor itself
//! never queues and never pushes back. Unbounded by construction; pairing
//! it with an [`AdmissionController`] is the point.
//!
//! [`AdmissionController`]: crate::core::AdmissionController

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crate::core::{DispatchError, Executor, WorkItem};

/// Executor spawning one detached OS thread per work item.
#[derive(Debug, Default)]
pub struct ThreadPerTaskExecutor {
    shutdown: AtomicBool,
    seq: AtomicU64,
}

impl ThreadPerTaskExecutor {
    /// Create an executor accepting work immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting new work. Threads already running are not interrupted.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl Executor for ThreadPerTaskExecutor {
    fn execute(&self, work: WorkItem) -> Result<(), DispatchError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::ExecutorUnavailable(
                "executor shut down".into(),
            ));
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("tg-task-{seq}"))
            .spawn(work)
            .map(|_| ())
            .map_err(|e| DispatchError::Internal(format!("thread spawn failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn runs_work_on_its_own_thread() {
        let exec = ThreadPerTaskExecutor::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&ran);
        let caller = thread::current().id();
        exec.execute(Box::new(move || {
            assert_ne!(thread::current().id(), caller);
            probe.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();
        for _ in 0..50 {
            if ran.load(Ordering::Relaxed) == 1 {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("work never ran");
    }

    #[test]
    fn refuses_work_after_shutdown() {
        let exec = ThreadPerTaskExecutor::new();
        exec.shutdown();
        assert!(exec.execute(Box::new(|| {})).is_err());
    }
}
