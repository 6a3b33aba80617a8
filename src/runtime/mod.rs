//! Executor implementations backing the admission controller.

pub mod spawning;
pub mod thread_pool;

#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use spawning::ThreadPerTaskExecutor;
pub use thread_pool::WorkerPoolExecutor;

#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioExecutor;
