//! Builders to construct dispatcher components from configuration.

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::core::{
    AdmissionController, DispatchError, HostScheduler, TaskRegistry, ThreadGuard,
};
use crate::runtime::WorkerPoolExecutor;

/// A wired dispatcher: the pool, the gate around it, and the registry on top.
pub struct Dispatcher<H: HostScheduler> {
    /// The shared worker pool; call [`WorkerPoolExecutor::shutdown`] at
    /// teardown after [`TaskRegistry::shutdown`].
    pub pool: Arc<WorkerPoolExecutor>,
    /// Admission gate guarding the pool.
    pub gate: AdmissionController<WorkerPoolExecutor>,
    /// Scheduled-task registry over the host primitives.
    pub registry: TaskRegistry<H, WorkerPoolExecutor>,
}

/// Build a worker pool, admission controller, and task registry from
/// validated configuration.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidConfig`] when any config section fails
/// validation.
pub fn build_dispatcher<H: HostScheduler>(
    cfg: &DispatchConfig,
    host: Arc<H>,
    guard: Arc<dyn ThreadGuard>,
) -> Result<Dispatcher<H>, DispatchError> {
    cfg.validate().map_err(DispatchError::InvalidConfig)?;
    let pool = Arc::new(WorkerPoolExecutor::from_config(&cfg.workers)?);
    let gate = AdmissionController::new(cfg.admission.clone(), Arc::clone(&pool), guard);
    let registry = TaskRegistry::new(host, gate.clone());
    Ok(Dispatcher {
        pool,
        gate,
        registry,
    })
}
