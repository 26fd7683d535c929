//! Shared worker-pool plumbing for the default subsystems.
//!
//! Both subsystems run the same loop: pop the submission queue, apply
//! the subsystem's transform, push the completion to the bus sink.
//! Workers drain the submission queue before exiting on shutdown, so
//! every accepted entry still gets its completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use log::warn;

use corun_core::completion::CompletionSink;
use corun_core::entry::{Cqe, Sqe};

/// State shared between a subsystem handle and its workers.
pub(crate) struct QueueInner {
    /// Submission queue: bus → workers.
    pub(crate) sq: ArrayQueue<Sqe>,
    /// Shutdown flag; workers drain and exit once set.
    pub(crate) stop: AtomicBool,
}

impl QueueInner {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            sq: ArrayQueue::new(capacity),
            stop: AtomicBool::new(false),
        })
    }
}

/// Spawn `workers` named threads running [`worker_loop`].
pub(crate) fn spawn_workers(
    name: &str,
    workers: usize,
    inner: &Arc<QueueInner>,
    sink: &Arc<dyn CompletionSink>,
    transform: fn(Sqe) -> Cqe,
) -> Vec<thread::JoinHandle<()>> {
    (0..workers)
        .map(|worker_id| {
            let inner = Arc::clone(inner);
            let sink = Arc::clone(sink);
            thread::Builder::new()
                .name(format!("{name}-worker-{worker_id}"))
                .spawn(move || worker_loop(inner, sink, transform))
                .expect("failed to spawn subsystem worker")
        })
        .collect()
}

/// Worker thread main loop.
fn worker_loop(inner: Arc<QueueInner>, sink: Arc<dyn CompletionSink>, transform: fn(Sqe) -> Cqe) {
    loop {
        match inner.sq.pop() {
            Some(sqe) => {
                let mut pending = Some(transform(sqe));
                // The sink is bounded; retry until the driver drains it.
                while let Some(cqe) = pending.take() {
                    if let Err(back) = sink.complete(cqe) {
                        if inner.stop.load(Ordering::Relaxed) {
                            warn!("dropping a completion: sink refused it during shutdown");
                            break;
                        }
                        pending = Some(back);
                        thread::park_timeout(Duration::from_micros(50));
                    }
                }
            }
            None => {
                if inner.stop.load(Ordering::Relaxed) {
                    break;
                }
                thread::park_timeout(Duration::from_millis(1));
            }
        }
    }
}
