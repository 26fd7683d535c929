//! `EchoSubsystem` — completes an echo submission with its own data.
//!
//! The simplest possible subsystem: useful as a wire-level smoke test
//! and as the reference for writing new subsystems.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use corun_core::completion::CompletionSink;
use corun_core::entry::{Cqe, Kind, Payload, Sqe, Submission, Value};
use corun_core::subsystem::Subsystem;

use crate::worker::{spawn_workers, QueueInner};

pub const ECHO_KIND: Kind = "echo";

/// Request: echo `data` back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoSubmission {
    pub data: String,
}

impl EchoSubmission {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

impl Submission for EchoSubmission {
    fn kind(&self) -> Kind {
        ECHO_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Response: the echoed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoCompletion {
    pub data: String,
}

pub struct EchoSubsystem {
    inner: Arc<QueueInner>,
    workers: usize,
    handles: Vec<thread::JoinHandle<()>>,
}

impl EchoSubsystem {
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

/// The echo transform; what workers apply entry by entry and what the
/// simulation bus calls in a batch.
fn echo(sqe: Sqe) -> Cqe {
    let (payload, callback) = sqe.into_parts();
    let submission = match payload {
        Payload::Typed(submission) => submission
            .into_any()
            .downcast::<EchoSubmission>()
            .expect("echo subsystem received a foreign submission"),
        Payload::Thunk(_) => panic!("echo subsystem received a thunk"),
    };
    let completion: Value = Arc::new(EchoCompletion {
        data: submission.data,
    });
    Cqe::new(Ok(completion), callback)
}

impl Subsystem for EchoSubsystem {
    fn kind(&self) -> Kind {
        ECHO_KIND
    }

    fn capacity(&self) -> usize {
        self.inner.sq.capacity()
    }

    fn start(&mut self, sink: Arc<dyn CompletionSink>) {
        if !self.handles.is_empty() {
            return;
        }
        self.handles = spawn_workers("echo", self.workers, &self.inner, &sink, echo);
    }

    fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.inner.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            handle.join().expect("echo worker panicked");
        }
    }

    fn enqueue(&mut self, sqe: Sqe) -> Result<(), Sqe> {
        debug_assert_eq!(sqe.kind(), ECHO_KIND);
        self.inner.sq.push(sqe)
    }

    fn flush(&mut self, _now: u64) {}

    fn process(&mut self, sqes: Vec<Sqe>) -> Vec<Cqe> {
        sqes.into_iter().map(echo).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SharedCompletionQueue;
    use corun_core::entry::Outcome;

    fn echo_sqe(data: &str) -> Sqe {
        Sqe::new(
            Payload::typed(EchoSubmission::new(data)),
            Box::new(|_: Outcome| {}),
        )
    }

    #[test]
    fn process_echoes_in_order() {
        let mut subsystem = EchoSubsystem::new(8, 1);
        let cqes = subsystem.process(vec![echo_sqe("a"), echo_sqe("b")]);
        let data: Vec<&str> = cqes
            .iter()
            .map(|cqe| {
                cqe.result()
                    .as_ref()
                    .unwrap()
                    .downcast_ref::<EchoCompletion>()
                    .unwrap()
                    .data
                    .as_str()
            })
            .collect();
        assert_eq!(data, ["a", "b"]);
    }

    #[test]
    fn workers_drain_the_queue_before_shutdown() {
        let queue = Arc::new(SharedCompletionQueue::new(16));
        let mut subsystem = EchoSubsystem::new(8, 2);
        for i in 0..5 {
            subsystem.enqueue(echo_sqe(&format!("m{i}"))).unwrap();
        }
        subsystem.start(Arc::clone(&queue) as Arc<dyn CompletionSink>);
        subsystem.shutdown();
        assert_eq!(queue.len(), 5, "every accepted entry got its completion");
    }

    #[test]
    fn enqueue_hands_back_on_overflow() {
        let mut subsystem = EchoSubsystem::new(1, 1);
        assert!(subsystem.enqueue(echo_sqe("keep")).is_ok());
        assert!(subsystem.enqueue(echo_sqe("spill")).is_err());
    }
}
