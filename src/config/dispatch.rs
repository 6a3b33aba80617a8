//! Dispatcher configuration structures.

use serde::{Deserialize, Serialize};

/// Admission limits for the shared async pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Whether backpressure is compiled in at all. When false every
    /// submission bypasses admission permanently.
    pub enabled: bool,
    /// Maximum work items concurrently executing on the pool (>= 1).
    pub max_in_flight: u32,
    /// Maximum work items parked on the backlog (0 disables queueing).
    pub max_queue: u32,
    /// Whether overflow may run synchronously on the submitting thread,
    /// provided that thread is not the host's restricted one.
    pub caller_runs_off_restricted: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight: 4096,
            max_queue: 16384,
            caller_runs_off_restricted: false,
        }
    }
}

impl AdmissionConfig {
    /// Validate admission limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_in_flight == 0 {
            return Err("max_in_flight must be greater than 0".into());
        }
        Ok(())
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of dedicated worker threads.
    pub worker_count: usize,
    /// Stack size per worker thread, in bytes.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl WorkerPoolConfig {
    /// Start from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the per-worker stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Validate pool sizing.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

/// Root dispatcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Admission limits.
    pub admission: AdmissionConfig,
    /// Worker pool sizing.
    pub workers: WorkerPoolConfig,
}

impl DispatchConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.admission
            .validate()
            .map_err(|e| format!("admission invalid: {e}"))?;
        self.workers
            .validate()
            .map_err(|e| format!("workers invalid: {e}"))?;
        Ok(())
    }

    /// Parse dispatcher configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
