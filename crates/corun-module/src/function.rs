//! `FunctionSubsystem` — executes thunk payloads.
//!
//! The subsystem behind the distinguished `"function"` kind: any
//! deferred call a computation yields is routed here, invoked on a
//! worker, and completed with the produced value.

use std::sync::Arc;
use std::thread;

use corun_core::completion::CompletionSink;
use corun_core::entry::{Cqe, Kind, Payload, Sqe, FUNCTION_KIND};
use corun_core::subsystem::Subsystem;

use crate::worker::{spawn_workers, QueueInner};

pub struct FunctionSubsystem {
    inner: Arc<QueueInner>,
    workers: usize,
    handles: Vec<thread::JoinHandle<()>>,
}

impl FunctionSubsystem {
    pub fn new(capacity: usize, workers: usize) -> Self {
        assert!(capacity > 0, "size must be positive");
        assert!(workers > 0, "workers must be positive");
        Self {
            inner: QueueInner::new(capacity),
            workers,
            handles: Vec::new(),
        }
    }
}

fn invoke(sqe: Sqe) -> Cqe {
    let (payload, callback) = sqe.into_parts();
    match payload {
        Payload::Thunk(thunk) => Cqe::new(Ok(thunk()), callback),
        Payload::Typed(submission) => panic!(
            "function subsystem received a typed submission of kind {:?}",
            submission.kind()
        ),
    }
}

impl Subsystem for FunctionSubsystem {
    fn kind(&self) -> Kind {
        FUNCTION_KIND
    }

    fn capacity(&self) -> usize {
        self.inner.sq.capacity()
    }

    fn start(&mut self, sink: Arc<dyn CompletionSink>) {
        if !self.handles.is_empty() {
            return;
        }
        self.handles = spawn_workers("function", self.workers, &self.inner, &sink, invoke);
    }

    fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.inner.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            handle.join().expect("function worker panicked");
        }
    }

    fn enqueue(&mut self, sqe: Sqe) -> Result<(), Sqe> {
        debug_assert_eq!(sqe.kind(), FUNCTION_KIND);
        self.inner.sq.push(sqe)
    }

    fn flush(&mut self, _now: u64) {}

    fn process(&mut self, sqes: Vec<Sqe>) -> Vec<Cqe> {
        sqes.into_iter().map(invoke).collect()
    }
}
