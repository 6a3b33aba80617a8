//! Error types for dispatcher operations.

use thiserror::Error;

/// Errors produced by dispatcher components.
///
/// Nothing in the submission path propagates these to callers; the
/// fire-and-forget contract absorbs all failure into counters and logs. They
/// surface only from construction, configuration validation, and [`Executor`]
/// implementations reporting infrastructure failure.
///
/// [`Executor`]: crate::core::Executor
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The underlying pool refused the hand-off (e.g. it is shutting down).
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure with context (worker thread gone, channel closed).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
