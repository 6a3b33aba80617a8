//! Tokio-backed executor adapter.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use crate::core::{DispatchError, Executor, WorkItem};

/// Executor dispatching work items onto a tokio blocking pool.
///
/// Work items are synchronous closures, so they land on the runtime's
/// blocking thread pool rather than its async workers.
#[derive(Clone)]
pub struct TokioExecutor {
    handle: Handle,
    // Keeps an owned runtime alive for executors built with
    // `with_worker_threads`; dropping it would shut the handle down.
    _runtime: Option<Arc<Runtime>>,
}

impl TokioExecutor {
    /// Adapt an existing runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }

    /// Build an executor owning a fresh multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the runtime cannot start.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            handle,
            _runtime: Some(Arc::new(runtime)),
        })
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, work: WorkItem) -> Result<(), DispatchError> {
        let _join = self.handle.spawn_blocking(work);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn dispatches_on_blocking_pool() {
        let exec = TokioExecutor::with_worker_threads(1).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&ran);
        exec.execute(Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();
        for _ in 0..50 {
            if ran.load(Ordering::Relaxed) == 1 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("work never ran");
    }
}
