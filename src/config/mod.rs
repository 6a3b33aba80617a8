//! Configuration models for admission limits and worker pools.

pub mod dispatch;

pub use dispatch::{AdmissionConfig, DispatchConfig, WorkerPoolConfig};
