//! Integration tests for the task registry over the in-process timer host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use taskgate::builders::build_dispatcher;
use taskgate::config::DispatchConfig;
use taskgate::core::{
    AdmissionController, NeverRestricted, TaskRegistry, Target,
};
use taskgate::infra::TimerHost;
use taskgate::runtime::{ThreadPerTaskExecutor, WorkerPoolExecutor};

type TestRegistry = TaskRegistry<TimerHost<ThreadPerTaskExecutor>, WorkerPoolExecutor>;

struct Fixture {
    registry: TestRegistry,
    host: Arc<TimerHost<ThreadPerTaskExecutor>>,
    pool: Arc<WorkerPoolExecutor>,
}

impl Fixture {
    fn new() -> Self {
        let host = Arc::new(TimerHost::start(Arc::new(ThreadPerTaskExecutor::new())));
        let pool = Arc::new(WorkerPoolExecutor::start(2));
        let gate = AdmissionController::new(
            taskgate::config::AdmissionConfig::default(),
            Arc::clone(&pool),
            Arc::new(NeverRestricted),
        );
        Self {
            registry: TaskRegistry::new(Arc::clone(&host), gate),
            host,
            pool,
        }
    }

    fn teardown(self) {
        self.registry.shutdown();
        self.host.shutdown();
        self.pool.shutdown();
    }
}

fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn one_shot_fires_and_self_removes() {
    let fx = Fixture::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&fired);
    let id = fx.registry.schedule_once(
        Target::Global,
        Duration::from_millis(20),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );
    assert_eq!(fx.registry.outstanding(), 1);
    assert!(wait_for(Duration::from_secs(2), || {
        fired.load(Ordering::Relaxed) == 1
    }));
    assert!(wait_for(Duration::from_secs(2), || {
        fx.registry.outstanding() == 0
    }));
    // Second-hand cancel of a fired id is a silent no-op.
    fx.registry.cancel(id);
    fx.teardown();
}

#[test]
fn cancelled_one_shot_never_fires() {
    let fx = Fixture::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&fired);
    let id = fx.registry.schedule_once(
        Target::Global,
        Duration::from_millis(60),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );
    fx.registry.cancel(id);
    assert_eq!(fx.registry.outstanding(), 0);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(fired.load(Ordering::Relaxed), 0);
    fx.teardown();
}

#[test]
fn periodic_persists_and_stops_on_cancel() {
    let fx = Fixture::new();
    let ticks = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ticks);
    let id = fx.registry.schedule_periodic(
        Target::Affinity(11),
        Duration::from_millis(5),
        Duration::from_millis(10),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );
    assert!(wait_for(Duration::from_secs(2), || {
        ticks.load(Ordering::Relaxed) >= 3
    }));
    assert_eq!(fx.registry.outstanding(), 1, "periodic ids never self-remove");

    fx.registry.cancel(id);
    assert_eq!(fx.registry.outstanding(), 0);
    thread::sleep(Duration::from_millis(40));
    let after_cancel = ticks.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(100));
    assert!(
        ticks.load(Ordering::Relaxed) <= after_cancel + 1,
        "at most one already-due straggler after cancel"
    );
    fx.teardown();
}

#[test]
fn double_cancel_is_a_no_op() {
    let fx = Fixture::new();
    let id = fx.registry.schedule_periodic(
        Target::Global,
        Duration::from_millis(5),
        Duration::from_millis(10),
        Box::new(|| {}),
    );
    fx.registry.cancel(id);
    fx.registry.cancel(id);
    fx.registry.cancel(424_242);
    fx.teardown();
}

#[test]
fn shutdown_stops_outstanding_periodics() {
    let fx = Fixture::new();
    let ticks = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ticks);
    fx.registry.schedule_periodic(
        Target::Global,
        Duration::from_millis(5),
        Duration::from_millis(10),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );
    assert!(wait_for(Duration::from_secs(2), || {
        ticks.load(Ordering::Relaxed) >= 2
    }));
    fx.registry.shutdown();
    assert_eq!(fx.registry.outstanding(), 0);
    thread::sleep(Duration::from_millis(40));
    let after = ticks.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(100));
    assert!(ticks.load(Ordering::Relaxed) <= after + 1);
    fx.teardown();
}

#[test]
fn run_async_lands_on_the_gated_pool() {
    let fx = Fixture::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ran);
    fx.registry.run_async(Box::new(move || {
        probe.fetch_add(1, Ordering::Relaxed);
    }));
    assert!(wait_for(Duration::from_secs(2), || {
        ran.load(Ordering::Relaxed) == 1
    }));
    assert_eq!(fx.registry.gate().snapshot().submitted, 1);
    fx.teardown();
}

#[test]
fn affinity_execution_collapses_to_global_on_the_timer_host() {
    let fx = Fixture::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ran);
    fx.registry.run_at(
        Target::Affinity(99),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );
    assert!(wait_for(Duration::from_secs(2), || {
        ran.load(Ordering::Relaxed) == 1
    }));
    fx.teardown();
}

#[test]
fn built_dispatcher_wires_registry_gate_and_pool() {
    let host = Arc::new(TimerHost::start(Arc::new(ThreadPerTaskExecutor::new())));
    let dispatcher = build_dispatcher(
        &DispatchConfig::default(),
        Arc::clone(&host),
        Arc::new(NeverRestricted),
    )
    .unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ran);
    dispatcher.registry.run_async(Box::new(move || {
        probe.fetch_add(1, Ordering::Relaxed);
    }));
    let probe = Arc::clone(&ran);
    dispatcher.registry.schedule_once(
        Target::Global,
        Duration::from_millis(10),
        Box::new(move || {
            probe.fetch_add(1, Ordering::Relaxed);
        }),
    );

    assert!(wait_for(Duration::from_secs(2), || {
        ran.load(Ordering::Relaxed) == 2
    }));
    let snap = dispatcher.gate.snapshot();
    assert_eq!(snap.submitted, 1);
    assert_eq!(snap.executed, 1);

    dispatcher.registry.shutdown();
    host.shutdown();
    dispatcher.pool.shutdown();
}
