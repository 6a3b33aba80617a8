//! Criterion benches for the admission fast path and snapshot reads.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use taskgate::config::AdmissionConfig;
use taskgate::core::{AdmissionController, DispatchError, Executor, NeverRestricted, WorkItem};

/// Executor that runs work inline so the bench measures admission overhead,
/// not thread hand-off.
struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, work: WorkItem) -> Result<(), DispatchError> {
        work();
        Ok(())
    }
}

fn gate(max_in_flight: u32, max_queue: u32) -> AdmissionController<InlineExecutor> {
    AdmissionController::new(
        AdmissionConfig {
            enabled: true,
            max_in_flight,
            max_queue,
            caller_runs_off_restricted: true,
        },
        Arc::new(InlineExecutor),
        Arc::new(NeverRestricted),
    )
}

fn bench_submit_fast_path(c: &mut Criterion) {
    let gate = gate(4096, 16384);
    c.bench_function("submit_direct_admission", |b| {
        b.iter(|| gate.submit(Box::new(|| {})));
    });
}

fn bench_submit_disabled(c: &mut Criterion) {
    let gate = AdmissionController::new(
        AdmissionConfig {
            enabled: false,
            ..AdmissionConfig::default()
        },
        Arc::new(InlineExecutor),
        Arc::new(NeverRestricted),
    );
    c.bench_function("submit_bypass", |b| {
        b.iter(|| gate.submit(Box::new(|| {})));
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let gate = gate(4096, 16384);
    for _ in 0..1000 {
        gate.submit(Box::new(|| {}));
    }
    c.bench_function("snapshot", |b| {
        b.iter(|| gate.snapshot());
    });
}

criterion_group!(
    benches,
    bench_submit_fast_path,
    bench_submit_disabled,
    bench_snapshot
);
criterion_main!(benches);
