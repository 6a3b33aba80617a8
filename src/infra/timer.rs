//! In-process host scheduler backed by a single timer thread.
//!
//! [`TimerHost`] is a [`HostScheduler`] for embeddings that have no
//! partitioned runtime of their own: tests, tools, and plain services. A
//! dedicated timer thread sleeps on a Condvar until the earliest deadline in
//! a binary heap, then hands the fired work to an [`Executor`]. Affinity
//! targets collapse to global execution; an in-process host has no
//! partitions to pin to.
//!
//! Cancellation is a flag checked at fire time; cancelled entries are
//! discarded lazily when their deadline pops.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::core::{CancelHandle, Executor, HostScheduler, RecurringWorkItem, Target, WorkItem};

enum EntryKind {
    Once(Option<WorkItem>),
    Periodic {
        work: Arc<dyn Fn() + Send + Sync>,
        period: Duration,
    },
}

struct TimerEntry {
    fire_at: Instant,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    kind: EntryKind,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.fire_at == other.fire_at
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest deadline
        // on top, FIFO within equal deadlines.
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct TimerShared {
    heap: Mutex<BinaryHeap<TimerEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
}

/// Cancel handle flipping the entry's flag; the timer thread discards the
/// entry when its deadline pops.
struct TimerCancel {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle for TimerCancel {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Timer-thread host scheduler dispatching fired work through an executor.
pub struct TimerHost<E: Executor> {
    exec: Arc<E>,
    shared: Arc<TimerShared>,
    seq: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Executor> TimerHost<E> {
    /// Start the timer thread, dispatching fired work through `exec`.
    #[must_use]
    pub fn start(exec: Arc<E>) -> Self {
        let shared = Arc::new(TimerShared {
            heap: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker = spawn_timer_thread(Arc::clone(&shared), Arc::clone(&exec));
        Self {
            exec,
            shared,
            seq: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop the timer thread. Entries that have not fired are dropped;
    /// work already handed to the executor is unaffected.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.wakeup.notify_all();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                debug!("timer thread exited by panic");
            }
        }
        self.shared.heap.lock().clear();
    }

    fn push(&self, entry: TimerEntry) {
        self.shared.heap.lock().push(entry);
        self.shared.wakeup.notify_all();
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl<E: Executor> HostScheduler for TimerHost<E> {
    fn execute(&self, _target: Target, work: WorkItem) {
        if self.exec.execute(work).is_err() {
            warn!("timer host dispatch failed; work dropped");
        }
    }

    fn schedule_once(
        &self,
        _target: Target,
        delay: Duration,
        work: WorkItem,
    ) -> Box<dyn CancelHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.push(TimerEntry {
            fire_at: Instant::now() + delay,
            seq: self.next_seq(),
            cancelled: Arc::clone(&cancelled),
            kind: EntryKind::Once(Some(work)),
        });
        Box::new(TimerCancel { cancelled })
    }

    fn schedule_periodic(
        &self,
        _target: Target,
        delay: Duration,
        period: Duration,
        work: RecurringWorkItem,
    ) -> Box<dyn CancelHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.push(TimerEntry {
            fire_at: Instant::now() + delay,
            seq: self.next_seq(),
            cancelled: Arc::clone(&cancelled),
            kind: EntryKind::Periodic {
                work: Arc::from(work),
                period,
            },
        });
        Box::new(TimerCancel { cancelled })
    }
}

impl<E: Executor> Drop for TimerHost<E> {
    fn drop(&mut self) {
        // Signal the thread but never join in Drop.
        if !self.shared.shutdown.swap(true, Ordering::AcqRel) {
            self.shared.wakeup.notify_all();
        }
    }
}

fn spawn_timer_thread<E: Executor>(shared: Arc<TimerShared>, exec: Arc<E>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("tg-timer".into())
        .spawn(move || {
            debug!("timer thread started");
            loop {
                let mut heap = shared.heap.lock();
                if shared.shutdown.load(Ordering::Acquire) {
                    break;
                }
                let now = Instant::now();
                let due = heap.peek().is_some_and(|e| e.fire_at <= now);
                if due {
                    let Some(mut entry) = heap.pop() else { continue };
                    if entry.cancelled.load(Ordering::Acquire) {
                        continue;
                    }
                    let dispatch: Option<WorkItem> = match &mut entry.kind {
                        EntryKind::Once(slot) => slot.take(),
                        EntryKind::Periodic { work, period } => {
                            let run = Arc::clone(work);
                            let rearmed = TimerEntry {
                                fire_at: entry.fire_at + *period,
                                seq: entry.seq,
                                cancelled: Arc::clone(&entry.cancelled),
                                kind: EntryKind::Periodic {
                                    work: Arc::clone(work),
                                    period: *period,
                                },
                            };
                            heap.push(rearmed);
                            Some(Box::new(move || (*run)()))
                        }
                    };
                    drop(heap);
                    if let Some(work) = dispatch {
                        if exec.execute(work).is_err() {
                            warn!("timer dispatch failed; work dropped");
                        }
                    }
                    continue;
                }
                // Sleep until the earliest deadline, or until a push/shutdown
                // notifies.
                match heap.peek().map(|e| e.fire_at) {
                    Some(fire_at) => {
                        let timeout = fire_at.saturating_duration_since(now);
                        let _ = shared.wakeup.wait_for(&mut heap, timeout);
                    }
                    None => shared.wakeup.wait(&mut heap),
                }
            }
            debug!("timer thread exiting");
        })
        .expect("failed to spawn timer thread")
}
